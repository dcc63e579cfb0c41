//! Lectern Core - Pipeline Types
//!
//! Pure data structures and pure functions shared by every Lectern crate.
//! This crate performs no I/O: content fingerprints, the clock abstraction,
//! provenance enums, the enrichment result record, the error taxonomy, the
//! OCR collaborator contract and the deterministic local text corrections
//! all live here.

pub mod clock;
pub mod enrichment;
pub mod error;
pub mod ocr;
pub mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub use clock::{Clock, SharedClock, SystemClock};
pub use enrichment::{
    CorrectionProvenance, DescriptionProvenance, EnrichmentResult, DESCRIPTION_ERROR,
    DESCRIPTION_UNAVAILABLE, EMPTY_DESCRIPTION, UNREADABLE_SENTINEL, WARNING_BASIC_CORRECTIONS,
    WARNING_LIMITED_DESCRIPTION, WARNING_NO_READABLE_TEXT, WARNING_QUOTA_EXHAUSTED,
};
pub use error::{ConfigError, LecternError, LecternResult, LlmError, OcrError};
pub use ocr::OcrEngine;
pub use text::{apply_local_corrections, is_unreadable_sentinel, truncate_chars};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 fingerprint of arbitrary byte content, used as a cache key.
///
/// Identical content always yields the same fingerprint. Distinct content may
/// collide with negligible probability.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint raw bytes.
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    /// Fingerprint the UTF-8 bytes of a string.
    pub fn of_text(text: &str) -> Self {
        Self::of(text.as_bytes())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix suitable for log fields.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

// ============================================================================
// TESTS
// ============================================================================
