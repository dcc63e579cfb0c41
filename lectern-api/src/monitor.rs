//! External Service Health Monitor
//!
//! A simplified circuit breaker over the shared external inference service.
//! It never opens on raw failure counts alone: the pipeline only stops
//! calling out once the failures look like quota exhaustion or rejected
//! credentials, since those are the only conditions retries cannot fix.
//! Any success fully resets it.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lectern_core::{Clock, SharedClock, SystemClock, Timestamp};
use serde::Serialize;

use crate::constants::{DEFAULT_EXHAUSTION_THRESHOLD, INVALID_KEY_MARKER, QUOTA_MARKER};
use crate::telemetry::METRICS;

// ============================================================================
// TYPES
// ============================================================================

/// Why the external service is considered unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionKind {
    /// Usage quota or rate budget used up
    QuotaExceeded,
    /// API key rejected
    InvalidCredentials,
}

impl ExhaustionKind {
    /// Classify an error message by its lowercase markers.
    pub fn classify(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        if lowered.contains(INVALID_KEY_MARKER) {
            Some(Self::InvalidCredentials)
        } else if lowered.contains(QUOTA_MARKER) {
            Some(Self::QuotaExceeded)
        } else {
            None
        }
    }
}

/// The most recent failure reported to a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    pub message: String,
    pub at: Timestamp,
}

#[derive(Debug, Default)]
struct MonitorState {
    last_error: Option<ErrorDescriptor>,
    error_count: u32,
    last_success_at: Option<Timestamp>,
}

/// Point-in-time copy of a monitor's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    pub error_count: u32,
    pub last_error: Option<ErrorDescriptor>,
    pub last_success_at: Option<Timestamp>,
    pub exhaustion: Option<ExhaustionKind>,
}

// ============================================================================
// HEALTH MONITOR
// ============================================================================

/// Tracks consecutive external-service failures.
///
/// Every read-modify-write happens under one mutex, so concurrent reports
/// never lose updates.
pub struct HealthMonitor {
    state: Mutex<MonitorState>,
    threshold: u32,
    clock: SharedClock,
}

impl HealthMonitor {
    /// Monitor with the default threshold and the wall clock.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_EXHAUSTION_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self::with_clock(threshold, SystemClock::shared())
    }

    pub fn with_clock(threshold: u32, clock: SharedClock) -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            threshold,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // The state has no multi-step invariants a panic could break.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the failure streak after a successful external call.
    pub fn report_success(&self) {
        let now = self.clock.now();
        {
            let mut state = self.lock();
            state.error_count = 0;
            state.last_success_at = Some(now);
        }
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.monitor_error_count.set(0);
        }
    }

    /// Record a failed external call.
    pub fn report_error(&self, err: impl fmt::Display) {
        let descriptor = ErrorDescriptor {
            message: err.to_string(),
            at: self.clock.now(),
        };
        let count = {
            let mut state = self.lock();
            state.error_count = state.error_count.saturating_add(1);
            state.last_error = Some(descriptor);
            state.error_count
        };
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.monitor_error_count.set(i64::from(count));
        }
    }

    /// Why the service looks exhausted, if it does.
    ///
    /// Requires more than `threshold` consecutive failures and a last error
    /// carrying a quota or invalid-key marker.
    pub fn exhaustion(&self) -> Option<ExhaustionKind> {
        let state = self.lock();
        Self::exhaustion_of(&state, self.threshold)
    }

    fn exhaustion_of(state: &MonitorState, threshold: u32) -> Option<ExhaustionKind> {
        if state.error_count <= threshold {
            return None;
        }
        state
            .last_error
            .as_ref()
            .and_then(|e| ExhaustionKind::classify(&e.message))
    }

    pub fn is_likely_exhausted(&self) -> bool {
        self.exhaustion().is_some()
    }

    pub fn error_count(&self) -> u32 {
        self.lock().error_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Consistent copy of the whole state for status reporting.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.lock();
        MonitorSnapshot {
            error_count: state.error_count,
            last_error: state.last_error.clone(),
            last_success_at: state.last_success_at,
            exhaustion: Self::exhaustion_of(&state, self.threshold),
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("HealthMonitor")
            .field("threshold", &self.threshold)
            .field("error_count", &snapshot.error_count)
            .field("exhaustion", &snapshot.exhaustion)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lectern_test_utils::ManualClock;
    use std::sync::Arc;

    const QUOTA_ERROR: &str = "429 Resource has been exhausted (e.g. check quota).";

    #[test]
    fn test_fresh_monitor_is_healthy() {
        let monitor = HealthMonitor::new();
        assert_eq!(monitor.error_count(), 0);
        assert!(!monitor.is_likely_exhausted());
        assert_eq!(monitor.snapshot().last_error, None);
    }

    #[test]
    fn test_threshold_must_be_exceeded() {
        let monitor = HealthMonitor::with_threshold(3);
        for _ in 0..3 {
            monitor.report_error(QUOTA_ERROR);
        }
        assert!(!monitor.is_likely_exhausted());

        monitor.report_error(QUOTA_ERROR);
        assert_eq!(monitor.exhaustion(), Some(ExhaustionKind::QuotaExceeded));
    }

    #[test]
    fn test_success_resets_streak() {
        let monitor = HealthMonitor::with_threshold(3);
        for _ in 0..4 {
            monitor.report_error(QUOTA_ERROR);
        }
        assert!(monitor.is_likely_exhausted());

        monitor.report_success();
        assert!(!monitor.is_likely_exhausted());
        assert_eq!(monitor.error_count(), 0);
    }

    #[test]
    fn test_hysteresis_requires_full_streak_again() {
        let monitor = HealthMonitor::with_threshold(3);
        for _ in 0..10 {
            monitor.report_error(QUOTA_ERROR);
        }
        monitor.report_success();
        for _ in 0..3 {
            monitor.report_error(QUOTA_ERROR);
            assert!(!monitor.is_likely_exhausted());
        }
        monitor.report_error(QUOTA_ERROR);
        assert!(monitor.is_likely_exhausted());
    }

    #[test]
    fn test_only_last_error_is_classified() {
        let monitor = HealthMonitor::with_threshold(3);
        for _ in 0..4 {
            monitor.report_error(QUOTA_ERROR);
        }
        monitor.report_error("connection reset by peer");
        assert_eq!(monitor.error_count(), 5);
        assert!(!monitor.is_likely_exhausted());
    }

    #[test]
    fn test_invalid_key_is_distinguished() {
        let monitor = HealthMonitor::with_threshold(1);
        monitor.report_error("400 API key not valid [API_KEY_INVALID]");
        monitor.report_error("400 API key not valid [API_KEY_INVALID]");
        assert_eq!(
            monitor.exhaustion(),
            Some(ExhaustionKind::InvalidCredentials)
        );
    }

    #[test]
    fn test_zero_threshold_trips_on_first_marker() {
        let monitor = HealthMonitor::with_threshold(0);
        monitor.report_error("Quota exceeded");
        assert!(monitor.is_likely_exhausted());
    }

    #[test]
    fn test_classify_markers_case_insensitive() {
        assert_eq!(
            ExhaustionKind::classify("QUOTA exceeded"),
            Some(ExhaustionKind::QuotaExceeded)
        );
        assert_eq!(
            ExhaustionKind::classify("reason: Api_Key_Invalid"),
            Some(ExhaustionKind::InvalidCredentials)
        );
        assert_eq!(ExhaustionKind::classify("timeout"), None);
    }

    #[test]
    fn test_snapshot_records_times_from_clock() {
        let clock = Arc::new(ManualClock::default());
        let monitor = HealthMonitor::with_clock(3, clock.clone());
        let t0 = clock.now();

        monitor.report_error("boom");
        clock.advance(Duration::seconds(5));
        monitor.report_success();
        clock.advance(Duration::seconds(5));
        monitor.report_error("bang");

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.last_success_at, Some(t0 + Duration::seconds(5)));
        let last_error = snapshot.last_error.as_ref().map(|e| (e.message.as_str(), e.at));
        assert_eq!(last_error, Some(("bang", t0 + Duration::seconds(10))));
        assert_eq!(snapshot.exhaustion, None);
    }

    #[test]
    fn test_concurrent_reports_lose_no_updates() {
        let monitor = Arc::new(HealthMonitor::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        monitor.report_error(QUOTA_ERROR);
                    }
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().is_ok());
        }
        assert_eq!(monitor.error_count(), 2000);
    }

    #[test]
    fn test_exhaustion_kind_serialization() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&ExhaustionKind::QuotaExceeded)?,
            "\"quota_exceeded\""
        );
        assert_eq!(
            serde_json::to_string(&ExhaustionKind::InvalidCredentials)?,
            "\"invalid_credentials\""
        );
        Ok(())
    }
}
