//! Error types for rouge-retrieval.
//!
//! Only failures that abort a request live here. Outcomes such as an unknown scope or a
//! budget too small for a single chunk are [`crate::types::Diagnostic`] values on an
//! otherwise successful result.

/// Errors that abort a retrieval request.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The embedding or vector-store call failed, timed out or was cancelled.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        service: &'static str,
        reason: String,
    },

    /// `manual_top_k` was present but not a positive integer.
    #[error("invalid top_k override {value:?}: must be a positive integer")]
    InvalidOverride { value: String },

    /// `score_threshold` was present but not a finite number.
    #[error("invalid score threshold {value}")]
    InvalidThreshold { value: f32 },

    /// Clamping left nothing to retrieve.
    #[error("target_k clamped to zero: {rationale}")]
    ZeroTargetK { rationale: String },

    #[error(
        "invalid token budget: reserved {reserved_overhead_tokens} of {max_context_tokens} tokens"
    )]
    InvalidBudget {
        max_context_tokens: usize,
        reserved_overhead_tokens: usize,
    },
}

impl RetrievalError {
    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    pub(crate) fn embedding(err: &rouge_llm::LlmError) -> Self {
        Self::UpstreamUnavailable {
            service: "embedding",
            reason: err.to_string(),
        }
    }

    pub(crate) fn vector_store(reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service: "vector_store",
            reason: reason.into(),
        }
    }
}

/// Result type alias using `RetrievalError`.
pub type Result<T> = std::result::Result<T, RetrievalError>;
