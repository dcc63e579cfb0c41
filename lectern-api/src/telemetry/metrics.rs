//! Prometheus Metrics Definitions
//!
//! Defines all Lectern metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// External call latency buckets (seconds)
const EXTERNAL_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<LecternMetrics>> = Lazy::new(LecternMetrics::new);

/// Which external service a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalService {
    Text,
    Vision,
}

impl ExternalService {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Vision => "vision",
        }
    }
}

/// How an external call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Error,
    Timeout,
}

impl CallOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// Container for all Lectern metrics.
#[derive(Clone)]
pub struct LecternMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// External call counter - labels: service, outcome
    pub external_calls_total: CounterVec,

    /// External call duration histogram - labels: service
    pub external_call_duration_seconds: HistogramVec,

    /// Cache lookup counter - labels: cache, result (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Local fallback counter - labels: stage
    pub fallbacks_total: CounterVec,

    /// Enrichment counter - labels: outcome
    pub enrichments_total: CounterVec,

    /// Current consecutive failure count of the health monitor
    pub monitor_error_count: IntGauge,
}

impl LecternMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "lectern_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "lectern_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            external_calls_total: register_counter_vec!(
                "lectern_external_calls_total",
                "Total calls to external inference services",
                &["service", "outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register external_calls_total: {}", e)))?,

            external_call_duration_seconds: register_histogram_vec!(
                "lectern_external_call_duration_seconds",
                "External inference call duration in seconds",
                &["service"],
                EXTERNAL_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register external_call_duration_seconds: {}", e)))?,

            cache_lookups_total: register_counter_vec!(
                "lectern_cache_lookups_total",
                "Cache lookups by cache and result",
                &["cache", "result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e)))?,

            fallbacks_total: register_counter_vec!(
                "lectern_fallbacks_total",
                "Local fallbacks taken by pipeline stage",
                &["stage"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register fallbacks_total: {}", e)))?,

            enrichments_total: register_counter_vec!(
                "lectern_enrichments_total",
                "Image enrichments by outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register enrichments_total: {}", e)))?,

            monitor_error_count: register_int_gauge!(
                "lectern_monitor_error_count",
                "Consecutive external service failures seen by the health monitor"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register monitor_error_count: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record one external call.
    pub fn record_external_call(
        &self,
        service: ExternalService,
        outcome: CallOutcome,
        duration_secs: f64,
    ) {
        self.external_calls_total
            .with_label_values(&[service.as_label(), outcome.as_label()])
            .inc();
        self.external_call_duration_seconds
            .with_label_values(&[service.as_label()])
            .observe(duration_secs);
    }

    /// Record a cache lookup.
    pub fn record_cache_lookup(&self, cache: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total
            .with_label_values(&[cache, result])
            .inc();
    }

    /// Record a local fallback.
    pub fn record_fallback(&self, stage: &str) {
        self.fallbacks_total.with_label_values(&[stage]).inc();
    }

    /// Record the end of an enrichment.
    pub fn record_enrichment(&self, outcome: &str) {
        self.enrichments_total.with_label_values(&[outcome]).inc();
    }
}

/// Run `f` against the global metrics if they registered successfully.
pub fn with_metrics(f: impl FnOnce(&LecternMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn metrics() -> Result<&'static LecternMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = metrics()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_external_call() -> Result<(), String> {
        let metrics = metrics()?;
        let before = metrics
            .external_calls_total
            .with_label_values(&["vision", "timeout"])
            .get();
        metrics.record_external_call(ExternalService::Vision, CallOutcome::Timeout, 60.0);
        let after = metrics
            .external_calls_total
            .with_label_values(&["vision", "timeout"])
            .get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_record_cache_and_fallback() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_cache_lookup("correction", true);
        metrics.record_cache_lookup("description", false);
        metrics.record_fallback("correction");
        metrics.record_enrichment("success");
        metrics.record_http_request("POST", "/upload", 200, 0.4);
        Ok(())
    }

    #[test]
    fn test_labels() {
        assert_eq!(ExternalService::Text.as_label(), "text");
        assert_eq!(CallOutcome::Success.as_label(), "success");
    }
}
