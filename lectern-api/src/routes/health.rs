//! Health Check Endpoint
//!
//! Liveness plus a summary of external service health. Always answers 200:
//! the pipeline keeps serving on local fallbacks when Gemini is unusable.

use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub gemini_available: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but only on local fallbacks.
    Degraded,
}

impl HealthStatus {
    fn from_flags(gemini_available: bool, exhausted: bool) -> Self {
        if gemini_available && exhausted {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let gemini_available = state.gemini_available();
    Json(HealthResponse {
        status: HealthStatus::from_flags(gemini_available, state.monitor.is_likely_exhausted()),
        gemini_available,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime(state.start_time),
    })
}

fn uptime(start: Instant) -> u64 {
    start.elapsed().as_secs()
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_degrades_only_when_configured_and_exhausted() {
        assert_eq!(HealthStatus::from_flags(true, false), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_flags(true, true), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_flags(false, false), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_response_serialization() -> Result<(), serde_json::Error> {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            gemini_available: false,
            version: "0.1.0".to_string(),
            uptime_seconds: 12,
        };
        let json = serde_json::to_value(&response)?;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["uptime_seconds"], 12);
        Ok(())
    }
}
