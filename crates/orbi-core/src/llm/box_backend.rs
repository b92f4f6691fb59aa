//! BoxGenerationBackend -- object-safe dynamic dispatch wrapper for GenerationBackend.
//!
//! 1. Define an object-safe `GenerationBackendDyn` trait with boxed futures
//! 2. Blanket-impl `GenerationBackendDyn` for all `T: GenerationBackend`
//! 3. `BoxGenerationBackend` wraps `Box<dyn GenerationBackendDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use orbi_types::llm::{LlmError, Turn};

use super::backend::GenerationBackend;

/// Object-safe version of [`GenerationBackend`] with boxed futures.
pub trait GenerationBackendDyn: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        history: &'a [Turn],
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;
}

/// Blanket implementation: any `GenerationBackend` automatically implements `GenerationBackendDyn`.
impl<T: GenerationBackend> GenerationBackendDyn for T {
    fn name(&self) -> &str {
        GenerationBackend::name(self)
    }

    fn model(&self) -> &str {
        GenerationBackend::model(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        history: &'a [Turn],
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(self.generate(history, prompt))
    }
}

/// Type-erased generation backend for runtime selection (Gemini vs OpenAI-compatible).
///
/// Since `GenerationBackend` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxGenerationBackend` itself implements `GenerationBackend` by
/// delegating to the inner trait object, so it can be handed to anything
/// generic over the trait.
pub struct BoxGenerationBackend {
    inner: Box<dyn GenerationBackendDyn + Send + Sync>,
}

impl BoxGenerationBackend {
    /// Wrap a concrete `GenerationBackend` in a type-erased box.
    pub fn new<T: GenerationBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }
}

impl GenerationBackend for BoxGenerationBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(&self, history: &[Turn], prompt: &str) -> Result<String, LlmError> {
        self.inner.generate_boxed(history, prompt).await
    }
}
