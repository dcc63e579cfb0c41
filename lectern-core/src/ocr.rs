//! OCR collaborator contract.
//!
//! Text extraction itself is out of scope for Lectern; the pipeline only
//! assumes this trait. Engines live in lectern-api.

use crate::LecternResult;
use async_trait::async_trait;

/// Opaque `text = OCR(image)` function.
///
/// Returning an empty string and returning an error are both treated as
/// "no text detected" by the orchestrator.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Extract raw text from image bytes.
    async fn extract_text(&self, image: &[u8]) -> LecternResult<String>;

    /// Engine name for logs.
    fn engine_name(&self) -> &str;
}
