//! GenerationBackend trait definition.
//!
//! This is the abstraction every text-generation integration implements.
//! History is passed in the store's `{user, assistant}` vocabulary; mapping
//! to a backend's own role names happens inside the implementation.

use orbi_types::llm::{LlmError, Turn};

/// Trait for generation backends (Gemini, OpenAI-compatible, ...).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
///
/// Implementations live in orbi-infra (e.g., `GeminiBackend`).
pub trait GenerationBackend: Send + Sync {
    /// Human-readable backend name (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Generate a reply to `prompt` given the prior conversation `history`.
    fn generate(
        &self,
        history: &[Turn],
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}
