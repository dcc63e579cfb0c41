//! REST API Routes Module
//!
//! Includes:
//! - Enrichment endpoints (/upload, /verify-text, /describe-image)
//! - External service status (/api-status) and root (/)
//! - Health check (/health)
//! - Prometheus metrics (/metrics)
//! - CORS support for browser-based clients

pub mod enrich;
pub mod health;
pub mod status;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, request::Parts, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Create the complete router with all routes and layers.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.api_config);
    let body_limit = DefaultBodyLimit::max(state.api_config.max_upload_bytes);

    // Execution order: CORS -> Observability -> Trace -> Handler
    Router::new()
        .merge(enrich::create_router())
        .merge(status::create_router())
        .merge(health::create_router())
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(observability_middleware))
        .layer(cors)
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed; otherwise origins
/// are matched by `ApiConfig::is_origin_allowed`, which understands
/// `*.example.com` wildcards.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if !config.is_production() {
        tracing::info!("CORS: Development mode - allowing all origins");
        return cors.allow_origin(Any);
    }

    tracing::info!(origins = ?config.cors_origins, "CORS: allowing configured origins");
    let config = config.clone();
    cors.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts: &Parts| {
            origin
                .to_str()
                .map(|o| config.is_origin_allowed(o))
                .unwrap_or(false)
        },
    ))
}
