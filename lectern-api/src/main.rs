//! Lectern API Server Entry Point
//!
//! Bootstraps telemetry and configuration, wires the pipeline, and starts
//! the Axum HTTP server.

use lectern_api::telemetry::{init_tracer, shutdown_tracer, TelemetryConfig};
use lectern_api::{create_router, ApiError, ApiResult, AppState, LecternConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let tracer = init_tracer(&telemetry_config)?;

    let config = LecternConfig::from_env()
        .map_err(|e| ApiError::internal_error(format!("Invalid configuration: {}", e)))?;
    let addr = config
        .api
        .bind_addr()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;

    let state = AppState::from_config(&config);
    tracing::info!(
        gemini_available = state.gemini_available(),
        exhaustion_threshold = config.pipeline.exhaustion_threshold,
        "Pipeline ready"
    );
    let app = create_router(state);

    tracing::info!(%addr, "Starting Lectern API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    shutdown_tracer(tracer);
    Ok(())
}
