//! Clock abstraction.
//!
//! Expiry and health bookkeeping read "now" through this trait so tests can
//! drive time deterministically.

use crate::Timestamp;
use chrono::Utc;
use std::sync::Arc;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by `chrono::Utc::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Shared handle to the wall clock.
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
