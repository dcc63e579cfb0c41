//! Gemini vision service

use super::client::GeminiClient;
use super::types::{Content, GenerateContentRequest, InlineData, Part};
use super::DEFAULT_MODEL;
use crate::VisionService;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lectern_core::LecternResult;

/// Image description backed by a multimodal Gemini model.
pub struct GeminiVisionService {
    client: GeminiClient,
    model: String,
}

impl GeminiVisionService {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn with_default_model(client: GeminiClient) -> Self {
        Self::new(client, DEFAULT_MODEL)
    }
}

/// Image MIME type recognized from leading magic bytes, if any.
pub fn sniff_image_mime(image: &[u8]) -> Option<&'static str> {
    match image {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("image/tiff"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

/// MIME type declared for the inline image. Unrecognized bytes are sent as
/// JPEG.
pub fn image_mime_type(image: &[u8]) -> &'static str {
    sniff_image_mime(image).unwrap_or("image/jpeg")
}

#[async_trait]
impl VisionService for GeminiVisionService {
    async fn describe(&self, prompt: &str, image: &[u8]) -> LecternResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::Text {
                    text: prompt.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: image_mime_type(image).to_string(),
                        data: STANDARD.encode(image),
                    },
                },
            ])],
            generation_config: None,
        };

        let response = self.client.generate_content(&self.model, &request).await?;
        // An answer without text is a valid (empty) description.
        Ok(response.text().unwrap_or_default())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for GeminiVisionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiVisionService")
            .field("model", &self.model)
            .finish()
    }
}
