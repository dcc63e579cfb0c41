//! Enrichment orchestration: OCR, then correction and description.

use std::sync::Arc;

use lectern_core::{
    CorrectionProvenance, EnrichmentResult, Fingerprint, LecternResult, OcrEngine, OcrError,
    UNREADABLE_SENTINEL, WARNING_BASIC_CORRECTIONS, WARNING_LIMITED_DESCRIPTION,
    WARNING_NO_READABLE_TEXT, WARNING_QUOTA_EXHAUSTED,
};

use super::{CorrectionStage, DescriptionStage};
use crate::monitor::{ExhaustionKind, HealthMonitor};
use crate::telemetry::with_metrics;

/// Composes OCR output, correction and description into one result.
///
/// The only error [`enrich`](Self::enrich) returns is
/// `OcrError::NoTextDetected`; every external failure is absorbed by the
/// stages and surfaces as a warning.
pub struct EnrichmentOrchestrator {
    ocr: Arc<dyn OcrEngine>,
    correction: Arc<CorrectionStage>,
    description: Arc<DescriptionStage>,
}

impl EnrichmentOrchestrator {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        correction: Arc<CorrectionStage>,
        description: Arc<DescriptionStage>,
    ) -> Self {
        Self {
            ocr,
            correction,
            description,
        }
    }

    pub fn correction(&self) -> &Arc<CorrectionStage> {
        &self.correction
    }

    pub fn description(&self) -> &Arc<DescriptionStage> {
        &self.description
    }

    /// Distinct monitors wired into the stages.
    pub fn monitors(&self) -> Vec<&Arc<HealthMonitor>> {
        let mut monitors = vec![self.correction.monitor()];
        let description = self.description.monitor();
        if !Arc::ptr_eq(monitors[0], description) {
            monitors.push(description);
        }
        monitors
    }

    /// First exhaustion reported by any wired monitor.
    pub fn exhaustion(&self) -> Option<ExhaustionKind> {
        self.monitors().into_iter().find_map(|m| m.exhaustion())
    }

    /// Extract, correct and describe one scanned image.
    pub async fn enrich(&self, image: &[u8]) -> LecternResult<EnrichmentResult> {
        let fingerprint = Fingerprint::of(image);

        let text = match self.ocr.extract_text(image).await {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::warn!(
                    fingerprint = %fingerprint.short(),
                    engine = self.ocr.engine_name(),
                    error = %err,
                    "OCR failed"
                );
                String::new()
            }
        };
        if text.is_empty() {
            with_metrics(|m| m.record_enrichment("no_text"));
            return Err(OcrError::NoTextDetected.into());
        }
        tracing::info!(
            fingerprint = %fingerprint.short(),
            chars = text.chars().count(),
            "OCR completed"
        );

        let (correction, description) = tokio::join!(
            self.correction.correct(&text),
            self.description.describe_keyed(fingerprint, image)
        );

        let mut result = if correction.text == UNREADABLE_SENTINEL {
            let mut result = EnrichmentResult {
                original_text: String::new(),
                corrected_text: String::new(),
                description: description.description,
                correction_provenance: CorrectionProvenance::None,
                description_provenance: description.provenance,
                warnings: Vec::new(),
            };
            result.push_warning(WARNING_NO_READABLE_TEXT);
            result
        } else {
            let mut result = EnrichmentResult {
                original_text: text,
                corrected_text: correction.text,
                description: description.description,
                correction_provenance: correction.provenance,
                description_provenance: description.provenance,
                warnings: Vec::new(),
            };
            if correction.provenance.is_fallback() {
                result.push_warning(WARNING_BASIC_CORRECTIONS);
            }
            result
        };

        if result.description_provenance.is_fallback() {
            result.push_warning(WARNING_LIMITED_DESCRIPTION);
        }
        if self.exhaustion().is_some() {
            result.push_warning(WARNING_QUOTA_EXHAUSTED);
        }

        with_metrics(|m| m.record_enrichment("success"));
        tracing::info!(
            fingerprint = %fingerprint.short(),
            correction = result.correction_provenance.as_wire_str(),
            description = result.description_provenance.as_wire_str(),
            warnings = result.warnings.len(),
            "Enrichment completed"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for EnrichmentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentOrchestrator")
            .field("ocr", &self.ocr.engine_name())
            .field("correction", &self.correction)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ResponseCache;
    use lectern_core::{DescriptionProvenance, LecternError, DESCRIPTION_UNAVAILABLE};
    use lectern_llm::{TextService, VisionService};
    use lectern_test_utils::fixtures::{quota_error, sample_png_bytes};
    use lectern_test_utils::{FixedOcr, ScriptedTextService, ScriptedVisionService};
    use std::time::Duration;

    fn cache() -> Arc<ResponseCache> {
        Arc::new(ResponseCache::new(16, Duration::from_secs(3600)))
    }

    fn orchestrator(
        ocr: FixedOcr,
        text: Option<Arc<ScriptedTextService>>,
        vision: Option<Arc<ScriptedVisionService>>,
        monitor: Arc<HealthMonitor>,
    ) -> EnrichmentOrchestrator {
        let correction = CorrectionStage::new(
            text.map(|s| s as Arc<dyn TextService>),
            cache(),
            monitor.clone(),
        );
        let description = DescriptionStage::new(
            vision.map(|s| s as Arc<dyn VisionService>),
            cache(),
            monitor,
        );
        EnrichmentOrchestrator::new(Arc::new(ocr), Arc::new(correction), Arc::new(description))
    }

    #[tokio::test]
    async fn test_blank_ocr_fails_without_stage_calls() {
        let text = Arc::new(ScriptedTextService::replying("x"));
        let vision = Arc::new(ScriptedVisionService::replying("y"));
        let orch = orchestrator(
            FixedOcr::text("  \n\t "),
            Some(text.clone()),
            Some(vision.clone()),
            Arc::new(HealthMonitor::new()),
        );

        let result = orch.enrich(&sample_png_bytes()).await;
        assert_eq!(result, Err(LecternError::Ocr(OcrError::NoTextDetected)));
        assert_eq!(text.calls(), 0);
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn test_ocr_error_is_no_text_detected() {
        let orch = orchestrator(
            FixedOcr::failing("tesseract not found"),
            None,
            None,
            Arc::new(HealthMonitor::new()),
        );
        let result = orch.enrich(b"img").await;
        assert!(matches!(result, Err(e) if e.is_no_text_detected()));
    }

    #[tokio::test]
    async fn test_full_external_path_has_no_warnings() -> LecternResult<()> {
        let orch = orchestrator(
            FixedOcr::text("  Hola  mundo \n"),
            Some(Arc::new(ScriptedTextService::replying("Hola mundo"))),
            Some(Arc::new(ScriptedVisionService::replying("A greeting card"))),
            Arc::new(HealthMonitor::new()),
        );

        let result = orch.enrich(&sample_png_bytes()).await?;
        assert_eq!(result.original_text, "Hola  mundo");
        assert_eq!(result.corrected_text, "Hola mundo");
        assert_eq!(result.description, "A greeting card");
        assert_eq!(result.correction_provenance, CorrectionProvenance::External);
        assert_eq!(result.description_provenance, DescriptionProvenance::External);
        assert!(result.warnings.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_local_only_path_warns_for_both_stages() -> LecternResult<()> {
        let orch = orchestrator(
            FixedOcr::text("a  b\n\n\nc"),
            None,
            None,
            Arc::new(HealthMonitor::new()),
        );

        let result = orch.enrich(b"img").await?;
        assert_eq!(result.corrected_text, "a b\n\nc");
        assert_eq!(result.correction_provenance, CorrectionProvenance::Local);
        assert_eq!(result.description, DESCRIPTION_UNAVAILABLE);
        assert_eq!(
            result.warnings,
            vec![
                WARNING_BASIC_CORRECTIONS.to_string(),
                WARNING_LIMITED_DESCRIPTION.to_string()
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_sentinel_clears_text_but_keeps_description() -> LecternResult<()> {
        let vision = Arc::new(ScriptedVisionService::replying("A photo of static"));
        let orch = orchestrator(
            FixedOcr::text("~~%% ##"),
            Some(Arc::new(ScriptedTextService::replying("TRUE"))),
            Some(vision.clone()),
            Arc::new(HealthMonitor::new()),
        );

        let result = orch.enrich(&sample_png_bytes()).await?;
        assert_eq!(result.original_text, "");
        assert_eq!(result.corrected_text, "");
        assert_eq!(result.correction_provenance, CorrectionProvenance::None);
        assert_eq!(result.description, "A photo of static");
        assert_eq!(result.warnings, vec![WARNING_NO_READABLE_TEXT.to_string()]);
        assert_eq!(vision.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sentinel_with_fallback_description_warns_twice() -> LecternResult<()> {
        let orch = orchestrator(
            FixedOcr::text("~~%% ##"),
            Some(Arc::new(ScriptedTextService::replying("True"))),
            None,
            Arc::new(HealthMonitor::new()),
        );

        let result = orch.enrich(b"img").await?;
        assert_eq!(
            result.warnings,
            vec![
                WARNING_NO_READABLE_TEXT.to_string(),
                WARNING_LIMITED_DESCRIPTION.to_string()
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_monitor_appends_quota_warning() -> LecternResult<()> {
        let monitor = Arc::new(HealthMonitor::new());
        for _ in 0..4 {
            monitor.report_error(quota_error());
        }
        let text = Arc::new(ScriptedTextService::replying("unused"));
        let orch = orchestrator(FixedOcr::text("texto"), Some(text.clone()), None, monitor);

        let result = orch.enrich(b"img").await?;
        assert_eq!(text.calls(), 0);
        assert_eq!(
            result.warnings.last().map(String::as_str),
            Some(WARNING_QUOTA_EXHAUSTED)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_separate_monitors_are_both_checked() -> LecternResult<()> {
        let correction = CorrectionStage::new(None, cache(), Arc::new(HealthMonitor::new()));
        let vision_monitor = Arc::new(HealthMonitor::new());
        for _ in 0..4 {
            vision_monitor.report_error(quota_error());
        }
        let description = DescriptionStage::new(None, cache(), vision_monitor);
        let orch = EnrichmentOrchestrator::new(
            Arc::new(FixedOcr::text("texto")),
            Arc::new(correction),
            Arc::new(description),
        );

        assert_eq!(orch.monitors().len(), 2);
        let result = orch.enrich(b"img").await?;
        assert!(result.warnings.contains(&WARNING_QUOTA_EXHAUSTED.to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_shared_monitor_counted_once() {
        let orch = orchestrator(FixedOcr::text("t"), None, None, Arc::new(HealthMonitor::new()));
        assert_eq!(orch.monitors().len(), 1);
    }
}
