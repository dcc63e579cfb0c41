//! Gemini HTTP client with rate limiting

use super::types::{ApiErrorBody, GenerateContentRequest, GenerateContentResponse};
use super::{DEFAULT_BASE_URL, PROVIDER_NAME};
use lectern_core::{LecternError, LecternResult, LlmError};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

/// Gemini API client with rate limiting.
///
/// Cheap to clone; clones share the HTTP connection pool and the limiter.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_request_interval: Duration,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key
    /// * `requests_per_minute` - Maximum requests per minute (default: 60)
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        let permits = requests_per_minute as usize;
        let min_interval_ms = (60_000 / requests_per_minute as u64).max(10);

        Self {
            client: Client::new(),
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limiter: Arc::new(Semaphore::new(permits)),
            last_request: Arc::new(Mutex::new(None)),
            min_request_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Point the client at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call `models/{model}:generateContent` with automatic rate limiting.
    pub async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> LecternResult<GenerateContentResponse> {
        // Rate limiting: acquire permit
        let _permit = self.rate_limiter.acquire().await.map_err(|e| {
            LecternError::Llm(LlmError::RequestFailed {
                provider: PROVIDER_NAME.to_string(),
                status: 0,
                message: format!("Rate limiter error: {}", e),
            })
        })?;

        // Enforce minimum interval between request starts
        {
            let mut last = self.last_request.lock().await;
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < self.min_request_interval {
                    tokio::time::sleep(self.min_request_interval - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        tracing::debug!(model, "Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LecternError::Llm(LlmError::Timeout {
                        provider: PROVIDER_NAME.to_string(),
                        after_ms: 0,
                    })
                } else {
                    LecternError::Llm(LlmError::RequestFailed {
                        provider: PROVIDER_NAME.to_string(),
                        status: 0,
                        message: format!("HTTP request failed: {}", e),
                    })
                }
            })?;

        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                LecternError::Llm(LlmError::InvalidResponse {
                    provider: PROVIDER_NAME.to_string(),
                    reason: format!("Failed to parse response: {}", e),
                })
            })
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(LecternError::Llm(classify_error(status, &error_text)))
        }
    }
}

/// Map a non-success response to the matching `LlmError`.
pub(crate) fn classify_error(status: StatusCode, body: &str) -> LlmError {
    let (message, reasons) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => (parsed.error.full_message(), parsed.error.reasons()),
        Err(_) => (body.to_string(), Vec::new()),
    };
    let key_invalid = reasons.iter().any(|r| r == "API_KEY_INVALID");

    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
            message,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::InvalidApiKey {
            provider: PROVIDER_NAME.to_string(),
            message,
        },
        _ if key_invalid => LlmError::InvalidApiKey {
            provider: PROVIDER_NAME.to_string(),
            message,
        },
        _ => LlmError::RequestFailed {
            provider: PROVIDER_NAME.to_string(),
            status: status.as_u16(),
            message,
        },
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("min_request_interval", &self.min_request_interval)
            .finish()
    }
}
