//! Resilient Enrichment Pipeline
//!
//! Two cache-fronted, monitor-gated stages (text correction and image
//! description) and the orchestrator that composes them with OCR output.
//! External failures never escape a stage: they are recorded into the
//! health monitor and replaced by a local fallback value.

pub mod correction;
pub mod description;
pub mod orchestrator;

pub use correction::{CorrectionOptions, CorrectionOutcome, CorrectionStage};
pub use description::{DescriptionOutcome, DescriptionStage};
pub use orchestrator::EnrichmentOrchestrator;

use std::future::Future;
use std::time::{Duration, Instant};

use lectern_core::{Fingerprint, LecternError, LecternResult, LlmError};
use lectern_llm::TtlCache;

use crate::telemetry::{with_metrics, CallOutcome, ExternalService};

/// Content-addressed cache of external service answers.
pub type ResponseCache = TtlCache<Fingerprint, String>;

/// Run one external call under `timeout`, recording its outcome.
///
/// The future is only polled here; if the caller drops the returned future
/// the call is abandoned and nothing after this await runs.
pub(crate) async fn timed_external_call<F>(
    service: ExternalService,
    provider: &str,
    timeout: Duration,
    call: F,
) -> LecternResult<String>
where
    F: Future<Output = LecternResult<String>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LecternError::Llm(LlmError::Timeout {
            provider: provider.to_string(),
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })),
    };

    let outcome = match &result {
        Ok(_) => CallOutcome::Success,
        Err(LecternError::Llm(LlmError::Timeout { .. })) => CallOutcome::Timeout,
        Err(_) => CallOutcome::Error,
    };
    with_metrics(|m| m.record_external_call(service, outcome, start.elapsed().as_secs_f64()));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_call_passes_result_through() {
        let result = timed_external_call(
            ExternalService::Text,
            "stub",
            Duration::from_secs(1),
            async { Ok("done".to_string()) },
        )
        .await;
        assert_eq!(result, Ok("done".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_call_times_out() {
        let result = timed_external_call(
            ExternalService::Vision,
            "stub",
            Duration::from_millis(50),
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok("late".to_string())
            },
        )
        .await;
        assert_eq!(
            result,
            Err(LecternError::Llm(LlmError::Timeout {
                provider: "stub".to_string(),
                after_ms: 50,
            }))
        );
    }
}
