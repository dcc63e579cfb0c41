//! Tracing Subscriber and OpenTelemetry Initialization
//!
//! Structured logs always go to stdout through `tracing-subscriber`. When an
//! OTLP endpoint is configured, spans are additionally exported over HTTP to
//! any OTLP-compatible backend (Jaeger, Grafana Tempo, ...).

use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Instrumentation scope name for spans created by this crate.
pub const TRACER_NAME: &str = "lectern-api";

const DEFAULT_LOG_FILTER: &str = "lectern_api=debug,lectern_llm=info,tower_http=info,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP HTTP endpoint for traces (e.g., "http://localhost:4318")
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Trace sampling ratio (0.0 to 1.0)
    pub trace_sample_rate: f64,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: TRACER_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            trace_sample_rate: 1.0,
            log_format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `LECTERN_OTLP_ENDPOINT`: enables span export when set
    /// - `LECTERN_SERVICE_NAME` (default: lectern-api)
    /// - `LECTERN_ENVIRONMENT` (default: development)
    /// - `LECTERN_TRACE_SAMPLE_RATE` (default: 1.0)
    /// - `LECTERN_LOG_FORMAT`: "json" or "pretty" (default: json)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            otlp_endpoint: std::env::var("LECTERN_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            service_name: std::env::var("LECTERN_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            service_version: defaults.service_version,
            environment: std::env::var("LECTERN_ENVIRONMENT").unwrap_or(defaults.environment),
            trace_sample_rate: std::env::var("LECTERN_TRACE_SAMPLE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.trace_sample_rate),
            log_format: match std::env::var("LECTERN_LOG_FORMAT").as_deref() {
                Ok("pretty") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
        }
    }

    fn sampler(&self) -> Sampler {
        if self.trace_sample_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.trace_sample_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.trace_sample_rate)
        }
    }
}

/// OTLP/HTTP expects the signal path on the endpoint.
fn traces_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.ends_with("/v1/traces") {
        trimmed.to_string()
    } else {
        format!("{}/v1/traces", trimmed)
    }
}

/// Keeps the span exporter alive; pass it to [`shutdown_tracer`] on exit.
#[derive(Debug, Default)]
pub struct TracerHandle {
    provider: Option<SdkTracerProvider>,
}

impl TracerHandle {
    pub fn is_exporting(&self) -> bool {
        self.provider.is_some()
    }
}

fn build_provider(config: &TelemetryConfig, endpoint: &str) -> ApiResult<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(traces_endpoint(endpoint))
        .build()
        .map_err(|e| ApiError::internal_error(format!("Failed to create OTLP exporter: {}", e)))?;

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", config.service_version.clone()),
            KeyValue::new("deployment.environment", config.environment.clone()),
        ])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build())
}

/// Install the global tracing subscriber.
///
/// Call once at startup before anything logs. Sets up W3C trace context
/// propagation, the env filter (`RUST_LOG`), the log formatter and, if
/// configured, the OTLP span exporter.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<TracerHandle> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let provider = build_provider(config, endpoint)?;
            global::set_tracer_provider(provider.clone());
            Some(provider)
        }
        None => None,
    };

    let otel_layer = provider
        .as_ref()
        .map(|p| OpenTelemetryLayer::new(p.tracer(TRACER_NAME)));
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);
    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    installed.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        "Telemetry initialized"
    );

    Ok(TracerHandle { provider })
}

/// Flush pending spans and stop the exporter.
pub fn shutdown_tracer(handle: TracerHandle) {
    if let Some(provider) = handle.provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer shutdown failed");
            return;
        }
        tracing::info!("Tracer shutdown complete");
    }
}
