//! Google Gemini provider implementation
//!
//! Text correction and image description over the `generateContent` REST
//! endpoint, sharing one rate-limited HTTP client.

pub mod client;
pub mod text;
pub mod types;
pub mod vision;

pub use client::GeminiClient;
pub use text::GeminiTextService;
pub use vision::GeminiVisionService;

/// Provider name used in errors and logs.
pub const PROVIDER_NAME: &str = "gemini";

/// Default model for both text and vision calls.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
