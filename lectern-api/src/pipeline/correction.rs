//! OCR text correction stage.

use std::sync::Arc;
use std::time::Duration;

use lectern_core::{
    apply_local_corrections, is_unreadable_sentinel, truncate_chars, CorrectionProvenance,
    Fingerprint, LecternError, LlmError, UNREADABLE_SENTINEL,
};
use lectern_llm::TextService;

use super::{timed_external_call, ResponseCache};
use crate::constants::{CORRECTION_PROMPT, DEFAULT_EXTERNAL_TIMEOUT, MAX_CORRECTION_INPUT_CHARS};
use crate::monitor::HealthMonitor;
use crate::telemetry::{with_metrics, ExternalService};

const CACHE_LABEL: &str = "correction";

/// Corrected text and the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionOutcome {
    pub text: String,
    pub provenance: CorrectionProvenance,
}

impl CorrectionOutcome {
    fn external(text: String) -> Self {
        Self {
            text,
            provenance: CorrectionProvenance::External,
        }
    }

    fn local(source: &str) -> Self {
        Self {
            text: apply_local_corrections(source),
            provenance: CorrectionProvenance::Local,
        }
    }

    /// Whether the external service judged the text unreadable.
    pub fn is_unreadable(&self) -> bool {
        self.text == UNREADABLE_SENTINEL
    }
}

/// Per-call knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionOptions {
    /// Skip the cache lookup and always attempt a fresh external call.
    /// The fresh answer still overwrites the cached one.
    pub bypass_cache: bool,
}

/// Cache-fronted, monitor-gated text correction with a local fallback.
pub struct CorrectionStage {
    service: Option<Arc<dyn TextService>>,
    cache: Arc<ResponseCache>,
    monitor: Arc<HealthMonitor>,
    timeout: Duration,
    max_input_chars: usize,
}

impl CorrectionStage {
    /// # Arguments
    /// * `service` - External text service, `None` for local-only operation
    /// * `cache` - Correction cache keyed by the fingerprint of the full text
    /// * `monitor` - Health monitor gating and recording external calls
    pub fn new(
        service: Option<Arc<dyn TextService>>,
        cache: Arc<ResponseCache>,
        monitor: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            service,
            cache,
            monitor,
            timeout: DEFAULT_EXTERNAL_TIMEOUT,
            max_input_chars: MAX_CORRECTION_INPUT_CHARS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// Correct OCR text, never failing.
    pub async fn correct(&self, text: &str) -> CorrectionOutcome {
        self.correct_with(text, CorrectionOptions::default()).await
    }

    pub async fn correct_with(&self, text: &str, options: CorrectionOptions) -> CorrectionOutcome {
        let key = Fingerprint::of_text(text);

        if !options.bypass_cache {
            let cached = self.cache.get(&key);
            with_metrics(|m| m.record_cache_lookup(CACHE_LABEL, cached.is_some()));
            if let Some(hit) = cached {
                tracing::debug!(fingerprint = %key.short(), "Correction cache hit");
                return CorrectionOutcome::external(hit);
            }
        }

        let service = match &self.service {
            Some(service) if !self.monitor.is_likely_exhausted() => service,
            Some(_) => {
                tracing::info!(fingerprint = %key.short(), "External text service exhausted, correcting locally");
                return self.fallback(text);
            }
            None => return self.fallback(text),
        };

        let prompt = format!(
            "{}{}",
            CORRECTION_PROMPT,
            truncate_chars(text, self.max_input_chars)
        );
        let response = timed_external_call(
            ExternalService::Text,
            service.model_id(),
            self.timeout,
            service.generate(&prompt),
        )
        .await;

        match response.and_then(|raw| self.interpret(service.model_id(), raw)) {
            Ok(corrected) => {
                self.cache.set(key, corrected.clone());
                self.monitor.report_success();
                tracing::debug!(
                    fingerprint = %key.short(),
                    unreadable = corrected == UNREADABLE_SENTINEL,
                    "Text corrected externally"
                );
                CorrectionOutcome::external(corrected)
            }
            Err(err) => {
                tracing::warn!(fingerprint = %key.short(), error = %err, "External correction failed");
                self.monitor.report_error(&err);
                self.fallback(text)
            }
        }
    }

    /// Canonicalize a raw model answer.
    fn interpret(&self, model: &str, raw: String) -> Result<String, LecternError> {
        if is_unreadable_sentinel(&raw) {
            return Ok(UNREADABLE_SENTINEL.to_string());
        }
        let corrected = raw.trim();
        if corrected.is_empty() {
            return Err(LecternError::Llm(LlmError::InvalidResponse {
                provider: model.to_string(),
                reason: "empty correction".to_string(),
            }));
        }
        Ok(corrected.to_string())
    }

    fn fallback(&self, text: &str) -> CorrectionOutcome {
        with_metrics(|m| m.record_fallback(CACHE_LABEL));
        CorrectionOutcome::local(text)
    }
}

impl std::fmt::Debug for CorrectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectionStage")
            .field("service", &self.service.as_ref().map(|s| s.model_id().to_string()))
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_test_utils::fixtures::{noisy_ocr_text, quota_error, transient_error};
    use lectern_test_utils::ScriptedTextService;

    fn cache() -> Arc<ResponseCache> {
        Arc::new(ResponseCache::new(10, Duration::from_secs(3600)))
    }

    fn stage_with(service: Option<Arc<ScriptedTextService>>) -> (CorrectionStage, Arc<HealthMonitor>) {
        let monitor = Arc::new(HealthMonitor::new());
        let service = service.map(|s| s as Arc<dyn TextService>);
        (CorrectionStage::new(service, cache(), monitor.clone()), monitor)
    }

    #[tokio::test]
    async fn test_no_service_uses_local_corrections() {
        let (stage, monitor) = stage_with(None);
        let outcome = stage.correct(noisy_ocr_text()).await;
        assert_eq!(outcome.text, "a b\n\nc");
        assert_eq!(outcome.provenance, CorrectionProvenance::Local);
        assert_eq!(monitor.error_count(), 0);
        assert!(stage.cache().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_monitor_skips_call() {
        let service = Arc::new(ScriptedTextService::replying("never"));
        let (stage, monitor) = stage_with(Some(service.clone()));
        for _ in 0..4 {
            monitor.report_error(quota_error());
        }

        let outcome = stage.correct(noisy_ocr_text()).await;
        assert_eq!(outcome.provenance, CorrectionProvenance::Local);
        assert_eq!(outcome.text, "a b\n\nc");
        assert_eq!(service.calls(), 0);
        assert_eq!(monitor.error_count(), 4);
    }

    #[tokio::test]
    async fn test_success_is_cached_and_reported() {
        let service = Arc::new(ScriptedTextService::replying("  Hola mundo.\n"));
        let (stage, monitor) = stage_with(Some(service.clone()));
        monitor.report_error(transient_error());

        let outcome = stage.correct("hola  mundo").await;
        assert_eq!(outcome.text, "Hola mundo.");
        assert_eq!(outcome.provenance, CorrectionProvenance::External);
        assert_eq!(monitor.error_count(), 0);
        assert_eq!(
            stage.cache().get(&Fingerprint::of_text("hola  mundo")),
            Some("Hola mundo.".to_string())
        );
    }

    #[tokio::test]
    async fn test_prompt_carries_truncated_text() {
        let service = Arc::new(ScriptedTextService::replying("ok"));
        let (stage, _) = stage_with(Some(service.clone()));
        let stage = stage.with_max_input_chars(5);

        stage.correct("ñandú y más").await;
        let prompts = service.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with(CORRECTION_PROMPT));
        assert!(prompts[0].ends_with("ñandú"));
    }

    #[tokio::test]
    async fn test_cache_key_uses_full_text() {
        let service = Arc::new(ScriptedTextService::sequence(vec![
            Ok("first".to_string()),
            Ok("second".to_string()),
        ]));
        let (stage, _) = stage_with(Some(service.clone()));
        let stage = stage.with_max_input_chars(3);

        assert_eq!(stage.correct("abcdef").await.text, "first");
        assert_eq!(stage.correct("abcxyz").await.text, "second");
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_sentinel_is_canonicalized() {
        let service = Arc::new(ScriptedTextService::replying(" true \n"));
        let (stage, _) = stage_with(Some(service));

        let outcome = stage.correct("#@!~ %%").await;
        assert_eq!(outcome.text, UNREADABLE_SENTINEL);
        assert!(outcome.is_unreadable());
        assert_eq!(outcome.provenance, CorrectionProvenance::External);
        assert_eq!(
            stage.cache().get(&Fingerprint::of_text("#@!~ %%")),
            Some(UNREADABLE_SENTINEL.to_string())
        );
    }

    #[tokio::test]
    async fn test_failure_reports_and_falls_back() {
        let service = Arc::new(ScriptedTextService::failing(quota_error()));
        let (stage, monitor) = stage_with(Some(service));

        let outcome = stage.correct(noisy_ocr_text()).await;
        assert_eq!(outcome.provenance, CorrectionProvenance::Local);
        assert_eq!(outcome.text, "a b\n\nc");
        assert_eq!(monitor.error_count(), 1);
        assert!(stage.cache().is_empty());
    }

    #[tokio::test]
    async fn test_empty_response_takes_failure_path() {
        let service = Arc::new(ScriptedTextService::replying("   "));
        let (stage, monitor) = stage_with(Some(service));

        let outcome = stage.correct("texto").await;
        assert_eq!(outcome.provenance, CorrectionProvenance::Local);
        assert_eq!(monitor.error_count(), 1);
        assert!(stage.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_is_idempotent() {
        let service = Arc::new(ScriptedTextService::sequence(vec![
            Ok("first answer".to_string()),
            Ok("second answer".to_string()),
        ]));
        let (stage, _) = stage_with(Some(service.clone()));

        let first = stage.correct("same text").await;
        let second = stage.correct("same text").await;
        assert_eq!(first, second);
        assert_eq!(second.provenance, CorrectionProvenance::External);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_bypass_cache_refreshes_entry() {
        let service = Arc::new(ScriptedTextService::sequence(vec![
            Ok("old".to_string()),
            Ok("new".to_string()),
        ]));
        let (stage, _) = stage_with(Some(service.clone()));

        stage.correct("page").await;
        let forced = stage
            .correct_with("page", CorrectionOptions { bypass_cache: true })
            .await;
        assert_eq!(forced.text, "new");
        assert_eq!(stage.correct("page").await.text, "new");
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_served_even_when_exhausted() {
        let service = Arc::new(ScriptedTextService::replying("cached"));
        let (stage, monitor) = stage_with(Some(service.clone()));
        stage.correct("page").await;
        for _ in 0..4 {
            monitor.report_error(quota_error());
        }

        let outcome = stage.correct("page").await;
        assert_eq!(outcome.text, "cached");
        assert_eq!(outcome.provenance, CorrectionProvenance::External);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failure() {
        let service = Arc::new(
            ScriptedTextService::replying("too late").with_delay(Duration::from_secs(120)),
        );
        let (stage, monitor) = stage_with(Some(service));
        let stage = stage.with_timeout(Duration::from_secs(1));

        let outcome = stage.correct("a  b").await;
        assert_eq!(outcome.provenance, CorrectionProvenance::Local);
        assert_eq!(monitor.error_count(), 1);
        let last = monitor.snapshot().last_error.map(|e| e.message);
        assert!(last.is_some_and(|m| m.contains("timed out")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_leaves_state_untouched() {
        let service = Arc::new(
            ScriptedTextService::replying("abandoned").with_delay(Duration::from_secs(30)),
        );
        let (stage, monitor) = stage_with(Some(service.clone()));

        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), stage.correct("page")).await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(service.calls(), 1);
        assert!(stage.cache().is_empty());
        assert_eq!(monitor.error_count(), 0);
        assert!(monitor.snapshot().last_success_at.is_none());
    }
}
