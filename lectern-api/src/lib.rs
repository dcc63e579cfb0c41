//! Lectern API - Resilient OCR Enrichment Service
//!
//! Turns scanned images into corrected text plus an image description.
//! OCR runs locally; text correction and image description are delegated to
//! an external generative service when one is configured and healthy, and
//! fall back to deterministic local answers otherwise. The result always
//! says which path produced each field.

pub mod config;
pub mod constants;
pub mod error;
pub mod macros;
pub mod monitor;
pub mod ocr;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{
    ApiConfig, EnvSource, GeminiConfig, LecternConfig, OcrConfig, PipelineConfig, ProcessEnv,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use monitor::{ExhaustionKind, HealthMonitor, MonitorSnapshot};
pub use ocr::TesseractOcr;
pub use pipeline::{
    CorrectionOptions, CorrectionOutcome, CorrectionStage, DescriptionOutcome, DescriptionStage,
    EnrichmentOrchestrator, ResponseCache,
};
pub use routes::create_router;
pub use state::AppState;
