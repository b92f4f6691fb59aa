//! Generation backend implementations.
//!
//! Contains concrete implementations of the [`GenerationBackend`] trait
//! defined in `orbi-core`, and a factory ([`create_backend`]) that builds
//! the configured one.
//!
//! [`GenerationBackend`]: orbi_core::llm::backend::GenerationBackend

pub mod gemini;
pub mod openai_compat;

use secrecy::SecretString;

use orbi_core::llm::backend::GenerationBackend;
use orbi_core::llm::box_backend::BoxGenerationBackend;
use orbi_types::config::{BackendKind, RelayConfig};
use orbi_types::llm::LlmError;

use self::gemini::GeminiBackend;
use self::openai_compat::OpenAiCompatibleBackend;

/// Create a [`BoxGenerationBackend`] for `config.backend`.
///
/// `api_key` is the already-resolved key for that backend.
///
/// # Errors
///
/// Returns `LlmError::AuthenticationFailed` when no key is provided.
pub fn create_backend(
    config: &RelayConfig,
    api_key: Option<&SecretString>,
) -> Result<BoxGenerationBackend, LlmError> {
    let key = api_key.ok_or(LlmError::AuthenticationFailed)?;

    let backend = match config.backend {
        BackendKind::Google => BoxGenerationBackend::new(GeminiBackend::new(
            key.clone(),
            config.gemini.clone(),
            config.system_prompt.clone(),
            config.http_timeout(),
        )?),
        BackendKind::Azure => BoxGenerationBackend::new(OpenAiCompatibleBackend::azure(
            key,
            config.openai.clone(),
            config.system_prompt.clone(),
        )),
    };

    tracing::info!(
        backend = backend.name(),
        model = backend.model(),
        "generation backend ready"
    );
    Ok(backend)
}
