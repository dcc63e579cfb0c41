//! Gemini text service

use super::client::GeminiClient;
use super::types::{Content, GenerateContentRequest, GenerationConfig, Part};
use super::{DEFAULT_MODEL, PROVIDER_NAME};
use crate::TextService;
use async_trait::async_trait;
use lectern_core::{LecternError, LecternResult, LlmError};

/// Text generation backed by a Gemini model.
pub struct GeminiTextService {
    client: GeminiClient,
    model: String,
}

impl GeminiTextService {
    /// Create a new text service.
    ///
    /// # Arguments
    /// * `client` - Shared Gemini client
    /// * `model` - Model name (e.g., "gemini-1.5-flash")
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Create the service with the default flash model.
    pub fn with_default_model(client: GeminiClient) -> Self {
        Self::new(client, DEFAULT_MODEL)
    }
}

#[async_trait]
impl TextService for GeminiTextService {
    async fn generate(&self, prompt: &str) -> LecternResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::Text {
                text: prompt.to_string(),
            }])],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.2), // Corrections should stay close to the source
                max_output_tokens: None,
            }),
        };

        let response = self.client.generate_content(&self.model, &request).await?;
        response.text().ok_or_else(|| {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("response blocked: {}", r))
                .unwrap_or_else(|| "response contained no text".to_string());
            LecternError::Llm(LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason,
            })
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for GeminiTextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiTextService")
            .field("model", &self.model)
            .finish()
    }
}
