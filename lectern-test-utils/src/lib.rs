//! Lectern Test Utilities
//!
//! Shared test infrastructure for the Lectern workspace:
//! - Scripted external services that record every call
//! - A fixed OCR engine
//! - A manually advanced clock
//! - Fixtures and proptest generators

pub use lectern_core::{
    Clock, LecternError, LecternResult, LlmError, OcrEngine, OcrError, Timestamp,
};
pub use lectern_llm::{TextService, VisionService};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward, with a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Default for ManualClock {
    /// Starts at 2024-01-01T00:00:00Z.
    fn default() -> Self {
        let start: DateTime<Utc> = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::new(start)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *lock(&self.now)
    }
}

// ============================================================================
// SCRIPTED RESPONSES
// ============================================================================

/// Queue of canned results. Once the queue is drained, every further call
/// gets the fallback.
#[derive(Debug)]
struct Script {
    queue: Mutex<VecDeque<LecternResult<String>>>,
    fallback: LecternResult<String>,
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
}

impl Script {
    fn new(responses: Vec<LecternResult<String>>, fallback: LecternResult<String>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    async fn next(&self) -> LecternResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = lock(&self.queue).pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

fn exhausted_script() -> LecternResult<String> {
    Err(LecternError::Llm(LlmError::RequestFailed {
        provider: "scripted".to_string(),
        status: 500,
        message: "script exhausted".to_string(),
    }))
}

// ============================================================================
// SCRIPTED TEXT SERVICE
// ============================================================================

/// Text service answering from a script and recording every prompt.
#[derive(Debug)]
pub struct ScriptedTextService {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTextService {
    /// Answers every call with `response`.
    pub fn always(response: LecternResult<String>) -> Self {
        Self::with_script(Vec::new(), response)
    }

    /// Answers with `text` on every call.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::always(Ok(text.into()))
    }

    /// Fails every call with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self::always(Err(LecternError::Llm(error)))
    }

    /// Answers with each response in turn, then fails.
    pub fn sequence(responses: Vec<LecternResult<String>>) -> Self {
        Self::with_script(responses, exhausted_script())
    }

    fn with_script(responses: Vec<LecternResult<String>>, fallback: LecternResult<String>) -> Self {
        Self {
            script: Script::new(responses, fallback),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long before answering (counted as one call immediately).
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.script.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl TextService for ScriptedTextService {
    async fn generate(&self, prompt: &str) -> LecternResult<String> {
        lock(&self.prompts).push(prompt.to_string());
        self.script.next().await
    }

    fn model_id(&self) -> &str {
        "scripted-text"
    }
}

// ============================================================================
// SCRIPTED VISION SERVICE
// ============================================================================

/// Vision service answering from a script and recording image sizes.
#[derive(Debug)]
pub struct ScriptedVisionService {
    script: Script,
    image_sizes: Mutex<Vec<usize>>,
}

impl ScriptedVisionService {
    pub fn always(response: LecternResult<String>) -> Self {
        Self::with_script(Vec::new(), response)
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::always(Ok(text.into()))
    }

    pub fn failing(error: LlmError) -> Self {
        Self::always(Err(LecternError::Llm(error)))
    }

    pub fn sequence(responses: Vec<LecternResult<String>>) -> Self {
        Self::with_script(responses, exhausted_script())
    }

    fn with_script(responses: Vec<LecternResult<String>>, fallback: LecternResult<String>) -> Self {
        Self {
            script: Script::new(responses, fallback),
            image_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.script.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn image_sizes(&self) -> Vec<usize> {
        lock(&self.image_sizes).clone()
    }
}

#[async_trait]
impl VisionService for ScriptedVisionService {
    async fn describe(&self, _prompt: &str, image: &[u8]) -> LecternResult<String> {
        lock(&self.image_sizes).push(image.len());
        self.script.next().await
    }

    fn model_id(&self) -> &str {
        "scripted-vision"
    }
}

// ============================================================================
// FIXED OCR
// ============================================================================

/// OCR engine returning the same result for every image.
#[derive(Debug)]
pub struct FixedOcr {
    result: LecternResult<String>,
    calls: AtomicUsize,
}

impl FixedOcr {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            result: Ok(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Engine that sees nothing.
    pub fn blank() -> Self {
        Self::text("")
    }

    /// Engine that crashes.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            result: Err(LecternError::Ocr(OcrError::EngineFailed {
                engine: "fixed".to_string(),
                reason: reason.into(),
            })),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn extract_text(&self, _image: &[u8]) -> LecternResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn engine_name(&self) -> &str {
        "fixed"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest generators for pipeline inputs.

    use proptest::prelude::*;

    /// OCR-like text: words separated by irregular whitespace.
    pub fn arb_ocr_text() -> impl Strategy<Value = String> {
        prop::collection::vec(("[a-zA-Z0-9áéíóúñ.,;:]{1,12}", "[ \t\n]{1,4}"), 1..20).prop_map(
            |parts| {
                parts
                    .into_iter()
                    .map(|(word, gap)| format!("{}{}", word, gap))
                    .collect()
            },
        )
    }

    /// Arbitrary image payloads.
    pub fn arb_image_bytes() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 1..2048)
    }

    /// Failure messages the external provider may produce.
    pub fn arb_error_message() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Resource has been exhausted (e.g. check quota).".to_string()),
            Just("API key not valid. [API_KEY_INVALID]".to_string()),
            Just("connection reset by peer".to_string()),
            Just("internal error".to_string()),
            "[a-z ]{0,40}",
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built inputs for common scenarios.

    use super::*;

    /// Minimal PNG header followed by filler bytes.
    pub fn sample_png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(b"\x00\x00\x00\x0DIHDRscanned-page");
        bytes
    }

    /// What Gemini reports once the free-tier quota is gone.
    pub fn quota_error() -> LlmError {
        LlmError::RateLimited {
            provider: "gemini".to_string(),
            message: "Resource has been exhausted (e.g. check quota). [RESOURCE_EXHAUSTED]"
                .to_string(),
        }
    }

    /// What Gemini reports for a rejected key.
    pub fn invalid_key_error() -> LlmError {
        LlmError::InvalidApiKey {
            provider: "gemini".to_string(),
            message: "API key not valid. Please pass a valid API key. [API_KEY_INVALID]"
                .to_string(),
        }
    }

    /// A transient failure carrying no exhaustion marker.
    pub fn transient_error() -> LlmError {
        LlmError::RequestFailed {
            provider: "gemini".to_string(),
            status: 503,
            message: "The model is overloaded. Please try again later.".to_string(),
        }
    }

    /// OCR output with the whitespace noise local corrections clean up.
    pub fn noisy_ocr_text() -> &'static str {
        "a  b\n\n\nc"
    }
}
