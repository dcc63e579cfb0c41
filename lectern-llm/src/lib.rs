//! Lectern LLM - External Inference Abstraction
//!
//! Provider-agnostic traits for the external text and vision services the
//! enrichment pipeline calls, the registry that holds whichever services are
//! configured, the bounded TTL cache placed in front of them, and the Gemini
//! implementation.

pub mod cache;
pub mod providers;

pub use cache::TtlCache;
pub use providers::gemini::{GeminiClient, GeminiTextService, GeminiVisionService};

use async_trait::async_trait;
use lectern_core::LecternResult;
use std::sync::Arc;

// ============================================================================
// TEXT SERVICE TRAIT
// ============================================================================

/// External text-generation service.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct MyModel { /* ... */ }
///
/// #[async_trait]
/// impl TextService for MyModel {
///     async fn generate(&self, prompt: &str) -> LecternResult<String> {
///         // Call the remote API
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait TextService: Send + Sync {
    /// Send a prompt and return the model's free-text answer.
    ///
    /// # Returns
    /// * `Ok(String)` - The raw response text
    /// * `Err(LecternError::Llm)` - If the call fails for any reason
    async fn generate(&self, prompt: &str) -> LecternResult<String>;

    /// Identifier of the model behind this service.
    fn model_id(&self) -> &str;
}

// ============================================================================
// VISION SERVICE TRAIT
// ============================================================================

/// External multimodal service that answers a prompt about an image.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Send a prompt together with raw image bytes.
    ///
    /// # Returns
    /// * `Ok(String)` - The raw response text (may be empty)
    /// * `Err(LecternError::Llm)` - If the call fails for any reason
    async fn describe(&self, prompt: &str, image: &[u8]) -> LecternResult<String>;

    /// Identifier of the model behind this service.
    fn model_id(&self) -> &str;
}

// ============================================================================
// SERVICE REGISTRY
// ============================================================================

/// Registry for external services.
/// Services must be explicitly registered - an empty registry means every
/// stage runs on its local fallback.
///
/// # Example
/// ```ignore
/// let mut registry = ServiceRegistry::new();
/// registry.register_text(Arc::new(GeminiTextService::new(client.clone(), "gemini-1.5-flash")));
///
/// let text = registry.text_opt();
/// ```
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    text: Option<Arc<dyn TextService>>,
    vision: Option<Arc<dyn VisionService>>,
}

impl ServiceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the text service, replacing any previous one.
    pub fn register_text(&mut self, service: Arc<dyn TextService>) {
        self.text = Some(service);
    }

    /// Register the vision service, replacing any previous one.
    pub fn register_vision(&mut self, service: Arc<dyn VisionService>) {
        self.vision = Some(service);
    }

    /// Text service if configured.
    pub fn text_opt(&self) -> Option<Arc<dyn TextService>> {
        self.text.clone()
    }

    /// Vision service if configured.
    pub fn vision_opt(&self) -> Option<Arc<dyn VisionService>> {
        self.vision.clone()
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn has_vision(&self) -> bool {
        self.vision.is_some()
    }

    /// True when at least one external service is registered.
    pub fn has_any(&self) -> bool {
        self.has_text() || self.has_vision()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("text", &self.text.as_ref().map(|s| s.model_id().to_string()))
            .field("vision", &self.vision.as_ref().map(|s| s.model_id().to_string()))
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::LlmError;

    struct EchoText;

    #[async_trait]
    impl TextService for EchoText {
        async fn generate(&self, prompt: &str) -> LecternResult<String> {
            Ok(prompt.to_string())
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    struct BlindVision;

    #[async_trait]
    impl VisionService for BlindVision {
        async fn describe(&self, _prompt: &str, image: &[u8]) -> LecternResult<String> {
            Ok(format!("{} bytes", image.len()))
        }

        fn model_id(&self) -> &str {
            "blind"
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ServiceRegistry::new();
        assert!(!registry.has_text());
        assert!(!registry.has_vision());
        assert!(!registry.has_any());
    }

    #[tokio::test]
    async fn test_registry_returns_registered_services() -> LecternResult<()> {
        let mut registry = ServiceRegistry::new();
        registry.register_text(Arc::new(EchoText));
        registry.register_vision(Arc::new(BlindVision));

        let text = registry.text_opt().ok_or(LlmError::InvalidResponse {
            provider: "registry".to_string(),
            reason: "text service missing".to_string(),
        })?;
        let vision = registry.vision_opt().ok_or(LlmError::InvalidResponse {
            provider: "registry".to_string(),
            reason: "vision service missing".to_string(),
        })?;
        assert_eq!(text.generate("ping").await?, "ping");
        assert_eq!(vision.describe("what", b"abcd").await?, "4 bytes");
        assert!(registry.has_any());
        Ok(())
    }

    #[test]
    fn test_registry_debug_shows_models() {
        let mut registry = ServiceRegistry::new();
        registry.register_text(Arc::new(EchoText));
        let debug = format!("{:?}", registry);
        assert!(debug.contains("echo"));
        assert!(debug.contains("None"));
    }
}
