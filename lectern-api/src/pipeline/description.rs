//! Image description stage.

use std::sync::Arc;
use std::time::Duration;

use lectern_core::{
    DescriptionProvenance, Fingerprint, DESCRIPTION_ERROR, DESCRIPTION_UNAVAILABLE,
    EMPTY_DESCRIPTION,
};
use lectern_llm::VisionService;

use super::{timed_external_call, ResponseCache};
use crate::constants::{DEFAULT_EXTERNAL_TIMEOUT, DESCRIPTION_PROMPT};
use crate::monitor::HealthMonitor;
use crate::telemetry::{with_metrics, ExternalService};

const CACHE_LABEL: &str = "description";

/// Image description and the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionOutcome {
    pub description: String,
    pub provenance: DescriptionProvenance,
}

impl DescriptionOutcome {
    fn external(description: String) -> Self {
        Self {
            description,
            provenance: DescriptionProvenance::External,
        }
    }

    fn fallback(description: &str) -> Self {
        Self {
            description: description.to_string(),
            provenance: DescriptionProvenance::Fallback,
        }
    }
}

/// Cache-fronted, monitor-gated image description with fixed fallbacks.
pub struct DescriptionStage {
    service: Option<Arc<dyn VisionService>>,
    cache: Arc<ResponseCache>,
    monitor: Arc<HealthMonitor>,
    timeout: Duration,
}

impl DescriptionStage {
    pub fn new(
        service: Option<Arc<dyn VisionService>>,
        cache: Arc<ResponseCache>,
        monitor: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            service,
            cache,
            monitor,
            timeout: DEFAULT_EXTERNAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
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

    /// Describe an image, never failing.
    pub async fn describe(&self, image: &[u8]) -> DescriptionOutcome {
        self.describe_keyed(Fingerprint::of(image), image).await
    }

    /// Describe an image whose fingerprint the caller already computed.
    pub async fn describe_keyed(&self, key: Fingerprint, image: &[u8]) -> DescriptionOutcome {
        let cached = self.cache.get(&key);
        with_metrics(|m| m.record_cache_lookup(CACHE_LABEL, cached.is_some()));
        if let Some(hit) = cached {
            tracing::debug!(fingerprint = %key.short(), "Description cache hit");
            return DescriptionOutcome::external(hit);
        }

        let service = match &self.service {
            Some(service) if !self.monitor.is_likely_exhausted() => service,
            _ => {
                with_metrics(|m| m.record_fallback(CACHE_LABEL));
                return DescriptionOutcome::fallback(DESCRIPTION_UNAVAILABLE);
            }
        };

        let response = timed_external_call(
            ExternalService::Vision,
            service.model_id(),
            self.timeout,
            service.describe(DESCRIPTION_PROMPT, image),
        )
        .await;

        match response {
            Ok(raw) => {
                let description = match raw.trim() {
                    "" => EMPTY_DESCRIPTION.to_string(),
                    text => text.to_string(),
                };
                self.cache.set(key, description.clone());
                self.monitor.report_success();
                tracing::debug!(
                    fingerprint = %key.short(),
                    bytes = image.len(),
                    "Image described externally"
                );
                DescriptionOutcome::external(description)
            }
            Err(err) => {
                tracing::warn!(fingerprint = %key.short(), error = %err, "External description failed");
                self.monitor.report_error(&err);
                with_metrics(|m| m.record_fallback(CACHE_LABEL));
                DescriptionOutcome::fallback(DESCRIPTION_ERROR)
            }
        }
    }
}

impl std::fmt::Debug for DescriptionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptionStage")
            .field("service", &self.service.as_ref().map(|s| s.model_id().to_string()))
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .finish()
    }
}
