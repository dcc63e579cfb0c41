//! External service status and root endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::constants::ROOT_MESSAGE;
use crate::monitor::ExhaustionKind;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub correction_cache_size: usize,
    pub description_cache_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiStatusResponse {
    pub gemini_available: bool,
    pub last_error: Option<String>,
    pub error_count: u32,
    pub likely_quota_exceeded: bool,
    pub exhaustion_kind: Option<ExhaustionKind>,
    pub cache_stats: CacheStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// GET /api-status
pub async fn api_status(State(state): State<AppState>) -> Json<ApiStatusResponse> {
    let snapshot = state.monitor.snapshot();
    Json(ApiStatusResponse {
        gemini_available: state.gemini_available(),
        last_error: snapshot.last_error.map(|e| e.message),
        error_count: snapshot.error_count,
        likely_quota_exceeded: snapshot.exhaustion.is_some(),
        exhaustion_kind: snapshot.exhaustion,
        cache_stats: CacheStats {
            correction_cache_size: state.correction().cache().len(),
            description_cache_size: state.description().cache().len(),
        },
    })
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: ROOT_MESSAGE,
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api-status", get(api_status))
}
