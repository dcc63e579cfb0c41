//! Error types for Lectern operations

use thiserror::Error;

/// External inference service errors.
///
/// These are always absorbed by the pipeline stages. The `Display` output of
/// every variant keeps the provider's own message, since the health monitor
/// classifies failures by their text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    #[error("Invalid API key for {provider}: {message}")]
    InvalidApiKey { provider: String, message: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request to {provider} timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },
}

/// OCR collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OcrError {
    #[error("OCR did not detect any text")]
    NoTextDetected,

    #[error("OCR engine {engine} failed: {reason}")]
    EngineFailed { engine: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Lectern errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LecternError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl LecternError {
    /// True for the one error the enrichment orchestrator surfaces.
    pub fn is_no_text_detected(&self) -> bool {
        matches!(self, LecternError::Ocr(OcrError::NoTextDetected))
    }
}

/// Result type alias for Lectern operations.
pub type LecternResult<T> = Result<T, LecternError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_keeps_provider_message() {
        let err = LlmError::RateLimited {
            provider: "gemini".to_string(),
            message: "Quota exceeded for metric generate_content_requests".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("gemini"));
        assert!(msg.to_lowercase().contains("quota"));
    }

    #[test]
    fn test_invalid_api_key_keeps_reason() {
        let err = LecternError::from(LlmError::InvalidApiKey {
            provider: "gemini".to_string(),
            message: "API key not valid. [API_KEY_INVALID]".to_string(),
        });
        assert!(err.to_string().contains("API_KEY_INVALID"));
    }

    #[test]
    fn test_timeout_display() {
        let err = LlmError::Timeout {
            provider: "gemini".to_string(),
            after_ms: 1500,
        };
        assert!(err.to_string().contains("1500ms"));
    }

    #[test]
    fn test_no_text_detected_predicate() {
        assert!(LecternError::from(OcrError::NoTextDetected).is_no_text_detected());
        assert!(!LecternError::from(LlmError::Timeout {
            provider: "gemini".to_string(),
            after_ms: 10,
        })
        .is_no_text_detected());
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "LECTERN_CORRECTION_CACHE_TTL_SECS".to_string(),
            value: "abc".to_string(),
            reason: "must be an integer".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("LECTERN_CORRECTION_CACHE_TTL_SECS"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("must be an integer"));
    }
}
