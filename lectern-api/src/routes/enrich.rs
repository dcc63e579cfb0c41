//! Enrichment Endpoints
//!
//! - POST /upload - OCR, correction and description of one image
//! - POST /verify-text - correction of caller-supplied text
//! - POST /describe-image - description of one image

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use lectern_core::{
    CorrectionProvenance, EnrichmentResult, WARNING_BASIC_CORRECTIONS,
    WARNING_LIMITED_DESCRIPTION,
};
use serde::{Deserialize, Serialize};

use crate::constants::UPLOAD_FIELD_NAME;
use crate::error::{ApiError, ApiResult};
use crate::pipeline::{CorrectionOptions, EnrichmentOrchestrator};
use crate::state::AppState;

const SUCCESS: &str = "success";

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub result: EnrichmentResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyTextRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// Skip the cache and ask the external service again.
    #[serde(default)]
    pub force_correction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTextResponse {
    pub status: String,
    pub original_text: String,
    pub corrected_text: String,
    pub correction_source: CorrectionProvenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Gemini,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeImageResponse {
    pub status: String,
    pub description: String,
    pub source: ImageSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /upload
pub async fn upload(
    State(orchestrator): State<Arc<EnrichmentOrchestrator>>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let image = read_upload(multipart).await?;
    let result = orchestrator.enrich(&image).await?;
    Ok(Json(UploadResponse {
        status: SUCCESS.to_string(),
        kind: "image".to_string(),
        result,
    }))
}

/// POST /verify-text
pub async fn verify_text(
    State(orchestrator): State<Arc<EnrichmentOrchestrator>>,
    body: Bytes,
) -> ApiResult<Json<VerifyTextResponse>> {
    let req: VerifyTextRequest = serde_json::from_slice(&body)?;
    let text = req.text.ok_or_else(|| ApiError::missing_field("text"))?;
    if text.trim().is_empty() {
        return Err(ApiError::invalid_input("text must not be empty"));
    }

    let options = CorrectionOptions {
        bypass_cache: req.force_correction,
    };
    let outcome = orchestrator.correction().correct_with(&text, options).await;
    let warning = outcome
        .provenance
        .is_fallback()
        .then(|| WARNING_BASIC_CORRECTIONS.to_string());

    Ok(Json(VerifyTextResponse {
        status: SUCCESS.to_string(),
        original_text: text,
        corrected_text: outcome.text,
        correction_source: outcome.provenance,
        warning,
    }))
}

/// POST /describe-image
pub async fn describe_image(
    State(orchestrator): State<Arc<EnrichmentOrchestrator>>,
    multipart: Multipart,
) -> ApiResult<Json<DescribeImageResponse>> {
    let image = read_upload(multipart).await?;
    let outcome = orchestrator.description().describe(&image).await;

    let (source, warning) = if outcome.provenance.is_fallback() {
        (ImageSource::Fallback, Some(WARNING_LIMITED_DESCRIPTION.to_string()))
    } else {
        (ImageSource::Gemini, None)
    };
    Ok(Json(DescribeImageResponse {
        status: SUCCESS.to_string(),
        description: outcome.description,
        source,
        warning,
    }))
}

/// Bytes of the `file` field of a multipart body.
async fn read_upload(mut multipart: Multipart) -> ApiResult<Vec<u8>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::invalid_input("Uploaded file is empty"));
        }
        return Ok(bytes.to_vec());
    }
    Err(ApiError::missing_field(UPLOAD_FIELD_NAME))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/verify-text", post(verify_text))
        .route("/describe-image", post(describe_image))
}
