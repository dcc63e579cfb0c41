//! External service provider implementations
//!
//! Concrete implementations of the TextService and VisionService traits.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiTextService, GeminiVisionService};
