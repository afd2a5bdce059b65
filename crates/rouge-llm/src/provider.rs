use std::future::Future;

use crate::error::LlmError;

/// Turns query text into a dense vector in the same space as the indexed chunks.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or answers with no vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &'static str;
}
