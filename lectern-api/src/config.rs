//! API Configuration Module
//!
//! Configuration for the external inference provider, the enrichment
//! pipeline, the OCR engine and the HTTP surface. Everything is loaded from
//! environment variables with defaults suitable for development; a variable
//! that is present but malformed is a startup error rather than a silent
//! fallback.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use lectern_core::ConfigError;
use secrecy::SecretString;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CORRECTION_CACHE_CAPACITY, DEFAULT_CORRECTION_CACHE_TTL,
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_DESCRIPTION_CACHE_CAPACITY, DEFAULT_DESCRIPTION_CACHE_TTL,
    DEFAULT_EXHAUSTION_THRESHOLD, DEFAULT_EXTERNAL_TIMEOUT, DEFAULT_GEMINI_REQUESTS_PER_MINUTE,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_OCR_LANGUAGES, DEFAULT_OCR_OEM, DEFAULT_OCR_PSM,
    DEFAULT_PORT, DEFAULT_TESSERACT_BINARY, MAX_CORRECTION_INPUT_CHARS,
};

// ============================================================================
// ENVIRONMENT LOOKUP
// ============================================================================

/// Source of configuration values. `from_env` reads the process environment;
/// tests pass a map.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// Non-empty trimmed value of `key`.
fn lookup(env: &impl EnvSource, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `key` if set, otherwise use `default`.
fn parse_or<T: FromStr>(env: &impl EnvSource, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(env, key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_secs_or(env: &impl EnvSource, key: &str, default: Duration) -> Result<Duration, ConfigError> {
    parse_or(env, key, default.as_secs()).map(Duration::from_secs)
}

fn require_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// GEMINI CONFIGURATION
// ============================================================================

/// External inference provider settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key. `None` disables every external service.
    pub api_key: Option<SecretString>,
    pub text_model: String,
    pub vision_model: String,
    /// Override for the REST endpoint (proxies, tests).
    pub base_url: Option<String>,
    pub requests_per_minute: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            text_model: lectern_llm::providers::gemini::DEFAULT_MODEL.to_string(),
            vision_model: lectern_llm::providers::gemini::DEFAULT_MODEL.to_string(),
            base_url: None,
            requests_per_minute: DEFAULT_GEMINI_REQUESTS_PER_MINUTE,
        }
    }
}

impl GeminiConfig {
    /// Environment variables:
    /// - `GEMINI_API_KEY`: API key (absent = local fallbacks only)
    /// - `LECTERN_GEMINI_TEXT_MODEL`: text model (default: gemini-1.5-flash)
    /// - `LECTERN_GEMINI_VISION_MODEL`: vision model (default: gemini-1.5-flash)
    /// - `LECTERN_GEMINI_BASE_URL`: REST endpoint override
    /// - `LECTERN_GEMINI_REQUESTS_PER_MINUTE`: client-side budget (default: 60)
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            api_key: lookup(env, "GEMINI_API_KEY").map(SecretString::from),
            text_model: lookup(env, "LECTERN_GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
            vision_model: lookup(env, "LECTERN_GEMINI_VISION_MODEL")
                .unwrap_or(defaults.vision_model),
            base_url: lookup(env, "LECTERN_GEMINI_BASE_URL"),
            requests_per_minute: parse_or(
                env,
                "LECTERN_GEMINI_REQUESTS_PER_MINUTE",
                defaults.requests_per_minute,
            )?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// Whether external services should be wired at all.
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive(
            "LECTERN_GEMINI_REQUESTS_PER_MINUTE",
            u64::from(self.requests_per_minute),
        )
    }
}

// ============================================================================
// PIPELINE CONFIGURATION
// ============================================================================

/// Cache sizing, degradation detection and external call limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub correction_cache_capacity: usize,
    pub correction_cache_ttl: Duration,
    pub description_cache_capacity: usize,
    pub description_cache_ttl: Duration,
    /// Failures that must be exceeded before exhaustion is assumed.
    pub exhaustion_threshold: u32,
    /// Upper bound on a single external call.
    pub external_timeout: Duration,
    pub max_correction_input_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            correction_cache_capacity: DEFAULT_CORRECTION_CACHE_CAPACITY,
            correction_cache_ttl: DEFAULT_CORRECTION_CACHE_TTL,
            description_cache_capacity: DEFAULT_DESCRIPTION_CACHE_CAPACITY,
            description_cache_ttl: DEFAULT_DESCRIPTION_CACHE_TTL,
            exhaustion_threshold: DEFAULT_EXHAUSTION_THRESHOLD,
            external_timeout: DEFAULT_EXTERNAL_TIMEOUT,
            max_correction_input_chars: MAX_CORRECTION_INPUT_CHARS,
        }
    }
}

impl PipelineConfig {
    /// Environment variables:
    /// - `LECTERN_CORRECTION_CACHE_CAPACITY` (default: 200)
    /// - `LECTERN_CORRECTION_CACHE_TTL_SECS` (default: 21600)
    /// - `LECTERN_DESCRIPTION_CACHE_CAPACITY` (default: 100)
    /// - `LECTERN_DESCRIPTION_CACHE_TTL_SECS` (default: 86400)
    /// - `LECTERN_EXHAUSTION_THRESHOLD` (default: 3)
    /// - `LECTERN_EXTERNAL_TIMEOUT_SECS` (default: 60)
    /// - `LECTERN_MAX_CORRECTION_CHARS` (default: 15000)
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            correction_cache_capacity: parse_or(
                env,
                "LECTERN_CORRECTION_CACHE_CAPACITY",
                d.correction_cache_capacity,
            )?,
            correction_cache_ttl: parse_secs_or(
                env,
                "LECTERN_CORRECTION_CACHE_TTL_SECS",
                d.correction_cache_ttl,
            )?,
            description_cache_capacity: parse_or(
                env,
                "LECTERN_DESCRIPTION_CACHE_CAPACITY",
                d.description_cache_capacity,
            )?,
            description_cache_ttl: parse_secs_or(
                env,
                "LECTERN_DESCRIPTION_CACHE_TTL_SECS",
                d.description_cache_ttl,
            )?,
            exhaustion_threshold: parse_or(
                env,
                "LECTERN_EXHAUSTION_THRESHOLD",
                d.exhaustion_threshold,
            )?,
            external_timeout: parse_secs_or(
                env,
                "LECTERN_EXTERNAL_TIMEOUT_SECS",
                d.external_timeout,
            )?,
            max_correction_input_chars: parse_or(
                env,
                "LECTERN_MAX_CORRECTION_CHARS",
                d.max_correction_input_chars,
            )?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// Cache capacities may be zero (caching disabled); TTLs, the timeout
    /// and the input bound may not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive(
            "LECTERN_CORRECTION_CACHE_TTL_SECS",
            self.correction_cache_ttl.as_secs(),
        )?;
        require_positive(
            "LECTERN_DESCRIPTION_CACHE_TTL_SECS",
            self.description_cache_ttl.as_secs(),
        )?;
        require_positive(
            "LECTERN_EXTERNAL_TIMEOUT_SECS",
            self.external_timeout.as_secs(),
        )?;
        require_positive(
            "LECTERN_MAX_CORRECTION_CHARS",
            self.max_correction_input_chars as u64,
        )
    }
}

// ============================================================================
// OCR CONFIGURATION
// ============================================================================

/// Tesseract invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub binary: String,
    pub languages: String,
    pub oem: u8,
    pub psm: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_TESSERACT_BINARY.to_string(),
            languages: DEFAULT_OCR_LANGUAGES.to_string(),
            oem: DEFAULT_OCR_OEM,
            psm: DEFAULT_OCR_PSM,
        }
    }
}

impl OcrConfig {
    /// Environment variables:
    /// - `LECTERN_TESSERACT_BIN` (default: tesseract)
    /// - `LECTERN_OCR_LANGUAGES` (default: spa+eng)
    /// - `LECTERN_OCR_OEM` (default: 3)
    /// - `LECTERN_OCR_PSM` (default: 6)
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            binary: lookup(env, "LECTERN_TESSERACT_BIN").unwrap_or(d.binary),
            languages: lookup(env, "LECTERN_OCR_LANGUAGES").unwrap_or(d.languages),
            oem: parse_or(env, "LECTERN_OCR_OEM", d.oem)?,
            psm: parse_or(env, "LECTERN_OCR_PSM", d.psm)?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oem > 3 {
            return Err(ConfigError::InvalidValue {
                field: "LECTERN_OCR_OEM".to_string(),
                value: self.oem.to_string(),
                reason: "must be between 0 and 3".to_string(),
            });
        }
        if self.psm > 13 {
            return Err(ConfigError::InvalidValue {
                field: "LECTERN_OCR_PSM".to_string(),
                value: self.psm.to_string(),
                reason: "must be between 0 and 13".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// HTTP CONFIGURATION
// ============================================================================

/// HTTP surface settings: CORS, upload limits, bind address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Largest accepted request body.
    pub max_upload_bytes: usize,

    pub bind_host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `LECTERN_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `LECTERN_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `LECTERN_MAX_UPLOAD_BYTES`: Request body limit (default: 10 MiB)
    /// - `LECTERN_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `LECTERN_API_PORT`: Bind port (default: 8000)
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let d = Self::default();
        let cors_origins = lookup(env, "LECTERN_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let port_key = if lookup(env, "PORT").is_some() {
            "PORT"
        } else {
            "LECTERN_API_PORT"
        };

        Ok(Self {
            cors_origins,
            cors_max_age_secs: parse_or(env, "LECTERN_CORS_MAX_AGE_SECS", d.cors_max_age_secs)?,
            max_upload_bytes: parse_or(env, "LECTERN_MAX_UPLOAD_BYTES", d.max_upload_bytes)?,
            bind_host: lookup(env, "LECTERN_API_BIND").unwrap_or(d.bind_host),
            port: parse_or(env, port_key, d.port)?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("LECTERN_MAX_UPLOAD_BYTES", self.max_upload_bytes as u64)?;
        self.bind_addr().map(|_| ())
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "LECTERN_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern))
                        || origin_domain == pattern;
                }
            }
            false
        })
    }
}

// ============================================================================
// COMBINED CONFIGURATION
// ============================================================================

/// Everything the server needs at startup.
#[derive(Debug, Clone, Default)]
pub struct LecternConfig {
    pub gemini: GeminiConfig,
    pub pipeline: PipelineConfig,
    pub ocr: OcrConfig,
    pub api: ApiConfig,
}

impl LecternConfig {
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let config = Self {
            gemini: GeminiConfig::from_source(env)?,
            pipeline: PipelineConfig::from_source(env)?,
            ocr: OcrConfig::from_source(env)?,
            api: ApiConfig::from_source(env)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate()?;
        self.pipeline.validate()?;
        self.ocr.validate()?;
        self.api.validate()
    }
}
