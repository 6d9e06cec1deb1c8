//! Language-model port.

use async_trait::async_trait;

use crate::domain::SamplingOptions;

/// Errors from a language-model collaborator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Transport failure, non-success status, or malformed response.
    #[error("language model service error: {0}")]
    Service(String),
}

/// A language model that turns a prompt into a textual reply.
///
/// Implementations must be `Send + Sync`: the worker pool shares one
/// client across all workers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a reply for `prompt` with the given sampling options.
    async fn generate(
        &self,
        prompt: &str,
        options: &SamplingOptions,
    ) -> Result<String, GenerationError>;
}
