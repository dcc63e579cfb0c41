//! Lectern Telemetry - Observability Infrastructure
//!
//! Structured logging, optional OpenTelemetry span export and Prometheus
//! metrics for the API layer. Everything works without an external collector.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, with_metrics, CallOutcome, ExternalService, LecternMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, shutdown_tracer, LogFormat, TelemetryConfig, TracerHandle};
