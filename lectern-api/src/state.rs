//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use lectern_core::OcrEngine;
use lectern_llm::{GeminiClient, GeminiTextService, GeminiVisionService, ServiceRegistry};
use secrecy::ExposeSecret;

use crate::config::{ApiConfig, GeminiConfig, LecternConfig, PipelineConfig};
use crate::monitor::HealthMonitor;
use crate::ocr::TesseractOcr;
use crate::pipeline::{CorrectionStage, DescriptionStage, EnrichmentOrchestrator, ResponseCache};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<EnrichmentOrchestrator>,
    /// Monitor shared by both stages.
    pub monitor: Arc<HealthMonitor>,
    /// External services that were configured at startup.
    pub registry: ServiceRegistry,
    pub api_config: Arc<ApiConfig>,
    pub start_time: Instant,
}

crate::impl_from_ref!(Arc<EnrichmentOrchestrator>, orchestrator);
crate::impl_from_ref!(Arc<HealthMonitor>, monitor);
crate::impl_from_ref!(ServiceRegistry, registry);
crate::impl_from_ref!(Instant, start_time);

impl AppState {
    /// Wire caches, monitor, stages and orchestrator around the given
    /// collaborators.
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        registry: ServiceRegistry,
        pipeline: &PipelineConfig,
        api_config: ApiConfig,
    ) -> Self {
        let monitor = Arc::new(HealthMonitor::with_threshold(pipeline.exhaustion_threshold));
        let correction_cache = Arc::new(ResponseCache::new(
            pipeline.correction_cache_capacity,
            pipeline.correction_cache_ttl,
        ));
        let description_cache = Arc::new(ResponseCache::new(
            pipeline.description_cache_capacity,
            pipeline.description_cache_ttl,
        ));

        let correction =
            CorrectionStage::new(registry.text_opt(), correction_cache, monitor.clone())
                .with_timeout(pipeline.external_timeout)
                .with_max_input_chars(pipeline.max_correction_input_chars);
        let description =
            DescriptionStage::new(registry.vision_opt(), description_cache, monitor.clone())
                .with_timeout(pipeline.external_timeout);

        let orchestrator =
            EnrichmentOrchestrator::new(ocr, Arc::new(correction), Arc::new(description));

        Self {
            orchestrator: Arc::new(orchestrator),
            monitor,
            registry,
            api_config: Arc::new(api_config),
            start_time: Instant::now(),
        }
    }

    /// Production wiring: Tesseract OCR plus Gemini when a key is configured.
    pub fn from_config(config: &LecternConfig) -> Self {
        let ocr =
            TesseractOcr::from_config(&config.ocr).with_timeout(config.pipeline.external_timeout);
        let registry = build_registry(&config.gemini);
        Self::new(Arc::new(ocr), registry, &config.pipeline, config.api.clone())
    }

    /// Whether any external service was configured.
    pub fn gemini_available(&self) -> bool {
        self.registry.has_any()
    }

    pub fn correction(&self) -> &Arc<CorrectionStage> {
        self.orchestrator.correction()
    }

    pub fn description(&self) -> &Arc<DescriptionStage> {
        self.orchestrator.description()
    }
}

/// Register Gemini text and vision services, or nothing without a key.
pub fn build_registry(config: &GeminiConfig) -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    let Some(key) = config.api_key.as_ref() else {
        tracing::warn!("GEMINI_API_KEY not set; running on local fallbacks only");
        return registry;
    };

    let mut client = GeminiClient::new(key.expose_secret(), config.requests_per_minute);
    if let Some(base_url) = &config.base_url {
        client = client.with_base_url(base_url.as_str());
    }
    registry.register_text(Arc::new(GeminiTextService::new(
        client.clone(),
        config.text_model.as_str(),
    )));
    registry.register_vision(Arc::new(GeminiVisionService::new(
        client,
        config.vision_model.as_str(),
    )));
    tracing::info!(
        text_model = %config.text_model,
        vision_model = %config.vision_model,
        "Gemini services configured"
    );
    registry
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("registry", &self.registry)
            .field("start_time", &self.start_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_test_utils::FixedOcr;
    use secrecy::SecretString;

    #[test]
    fn test_registry_empty_without_key() {
        let registry = build_registry(&GeminiConfig::default());
        assert!(!registry.has_any());
    }

    #[test]
    fn test_registry_uses_configured_models() {
        let config = GeminiConfig {
            api_key: Some(SecretString::from("test-key")),
            vision_model: "gemini-pro-vision".to_string(),
            ..GeminiConfig::default()
        };
        let registry = build_registry(&config);
        let text = registry.text_opt().map(|s| s.model_id().to_string());
        let vision = registry.vision_opt().map(|s| s.model_id().to_string());
        assert_eq!(text.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(vision.as_deref(), Some("gemini-pro-vision"));
    }

    #[test]
    fn test_state_shares_one_monitor() {
        let state = AppState::new(
            Arc::new(FixedOcr::blank()),
            ServiceRegistry::new(),
            &PipelineConfig::default(),
            ApiConfig::default(),
        );
        assert!(Arc::ptr_eq(&state.monitor, state.correction().monitor()));
        assert!(Arc::ptr_eq(&state.monitor, state.description().monitor()));
        assert_eq!(state.correction().cache().capacity(), 200);
        assert_eq!(state.description().cache().capacity(), 100);
        assert!(!state.gemini_available());
    }
}
