//! Enrichment result types.
//!
//! Pure data types for the enrichment pipeline. Stages and orchestration
//! live in lectern-api.

use serde::{Deserialize, Serialize};

// ============================================================================
// PROTOCOL CONSTANTS
// ============================================================================

/// Literal the text model returns when it judges the OCR output unreadable.
///
/// The external service speaks free text, so this single constant is the
/// whole contract. Responses are trimmed and compared case-insensitively; the
/// cached and returned value is always this exact literal.
pub const UNREADABLE_SENTINEL: &str = "True";

/// Description returned when the vision service is unconfigured or exhausted.
pub const DESCRIPTION_UNAVAILABLE: &str = "description unavailable";

/// Description returned when the vision call fails.
pub const DESCRIPTION_ERROR: &str = "error generating description";

/// Description cached when the vision model answers with nothing.
pub const EMPTY_DESCRIPTION: &str = "no description could be generated";

/// Warning when correction fell back to local normalization.
pub const WARNING_BASIC_CORRECTIONS: &str =
    "using basic corrections (external text service unavailable)";

/// Warning when the description came from the fallback path.
pub const WARNING_LIMITED_DESCRIPTION: &str =
    "limited description (external vision service unavailable)";

/// Warning when the text model judged the OCR text unreadable.
pub const WARNING_NO_READABLE_TEXT: &str = "no readable text detected; returning description only";

/// Warning appended whenever a health monitor reports exhaustion.
pub const WARNING_QUOTA_EXHAUSTED: &str = "external service quota likely exhausted";

// ============================================================================
// PROVENANCE
// ============================================================================

/// Which path produced the corrected text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrectionProvenance {
    /// External text service (or a cache entry it produced)
    #[serde(rename = "gemini")]
    External,
    /// Local deterministic normalization
    #[serde(rename = "basic")]
    Local,
    /// No usable text; correction skipped
    #[serde(rename = "none (sin texto)")]
    None,
}

impl CorrectionProvenance {
    /// Wire representation used in JSON responses.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::External => "gemini",
            Self::Local => "basic",
            Self::None => "none (sin texto)",
        }
    }

    /// Whether the local fallback produced the text.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Which path produced the image description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptionProvenance {
    /// External vision service (or a cache entry it produced)
    #[serde(rename = "gemini-1.5-flash")]
    External,
    /// Fixed fallback text
    #[serde(rename = "fallback")]
    Fallback,
}

impl DescriptionProvenance {
    /// Wire representation used in JSON responses.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::External => "gemini-1.5-flash",
            Self::Fallback => "fallback",
        }
    }

    /// Whether the fallback text was used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}

// ============================================================================
// ENRICHMENT RESULT
// ============================================================================

/// Result of enriching one scanned image.
///
/// Created fresh per request and returned to the caller; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Raw OCR text (empty when the text was judged unreadable)
    pub original_text: String,
    /// Corrected text (empty when the text was judged unreadable)
    pub corrected_text: String,
    /// Image description
    pub description: String,
    /// Path that produced `corrected_text`
    #[serde(rename = "correction_source")]
    pub correction_provenance: CorrectionProvenance,
    /// Path that produced `description`
    #[serde(rename = "vision_source")]
    pub description_provenance: DescriptionProvenance,
    /// Degradation warnings, in the order they were raised
    pub warnings: Vec<String>,
}

impl EnrichmentResult {
    /// Append a warning.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// True when any field came from a fallback path.
    pub fn is_degraded(&self) -> bool {
        self.correction_provenance.is_fallback() || self.description_provenance.is_fallback()
    }
}

// ============================================================================
// TESTS
// ============================================================================
