//! Constants for the Lectern API
//!
//! Defaults for every configurable value plus the fixed prompts sent to the
//! external services.

use std::time::Duration;

// ============================================================================
// CACHES
// ============================================================================

/// Default capacity of the correction cache
pub const DEFAULT_CORRECTION_CACHE_CAPACITY: usize = 200;

/// Default TTL of the correction cache (6 hours)
pub const DEFAULT_CORRECTION_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Default capacity of the description cache
pub const DEFAULT_DESCRIPTION_CACHE_CAPACITY: usize = 100;

/// Default TTL of the description cache (24 hours)
pub const DEFAULT_DESCRIPTION_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// HEALTH MONITOR
// ============================================================================

/// Consecutive failures that must be exceeded before exhaustion is assumed
pub const DEFAULT_EXHAUSTION_THRESHOLD: u32 = 3;

/// Lowercase marker identifying quota exhaustion in an error message
pub const QUOTA_MARKER: &str = "quota";

/// Lowercase marker identifying rejected credentials in an error message
pub const INVALID_KEY_MARKER: &str = "api_key_invalid";

// ============================================================================
// EXTERNAL CALLS
// ============================================================================

/// Default timeout applied to a single external call
pub const DEFAULT_EXTERNAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of characters of OCR text sent for correction
pub const MAX_CORRECTION_INPUT_CHARS: usize = 15_000;

/// Default client-side request budget for the Gemini API
pub const DEFAULT_GEMINI_REQUESTS_PER_MINUTE: u32 = 60;

/// Instructions prepended to the OCR text sent for correction.
///
/// The model either answers with the corrected text or with the unreadable
/// sentinel literal.
pub const CORRECTION_PROMPT: &str = "First, decide whether the following text is readable. \
If it is not readable (noise or meaningless characters), answer EXACTLY \"True\" \
(without quotes). Otherwise, correct spelling and grammar while keeping the \
structure, technical terms and original language. Return ONLY the corrected text \
or the word True.\n\n";

/// Prompt sent with every image to the vision service.
pub const DESCRIPTION_PROMPT: &str = "ONLY answer with a detailed description of this image, \
including relevant text and context. Be precise and concise.";

// ============================================================================
// OCR
// ============================================================================

/// Default OCR binary
pub const DEFAULT_TESSERACT_BINARY: &str = "tesseract";

/// Default OCR languages
pub const DEFAULT_OCR_LANGUAGES: &str = "spa+eng";

/// Default OCR engine mode (LSTM + legacy)
pub const DEFAULT_OCR_OEM: u8 = 3;

/// Default page segmentation mode (single uniform block of text)
pub const DEFAULT_OCR_PSM: u8 = 6;

// ============================================================================
// HTTP
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

/// Default maximum upload size (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8000;

/// Multipart field carrying the uploaded image
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Message served at the root endpoint
pub const ROOT_MESSAGE: &str = "Lectern API is running";
