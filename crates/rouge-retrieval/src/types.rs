//! Request, chunk and result types shared by the pipeline stages.

use std::fmt;
use std::num::NonZeroUsize;

use rouge_memory::{ChunkPayload, MalformedPayload, ScopeKey, ScoredVectorPoint, TokenEstimator};
use serde::Serialize;

use crate::error::{Result, RetrievalError};
use crate::intent::QueryIntent;
use crate::topk::TopKDecision;

/// A fetched fragment of source text. Never modified after conversion from a search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub estimated_tokens: usize,
    pub source_id: String,
    pub scope_key: Option<ScopeKey>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub chunk_index: Option<u64>,
    pub similarity_score: f32,
    /// Position in the candidate list as returned by the vector store.
    pub original_rank: usize,
}

impl Chunk {
    /// # Errors
    ///
    /// Returns [`MalformedPayload`] if the stored payload cannot describe a chunk.
    pub fn from_hit(
        hit: &ScoredVectorPoint,
        original_rank: usize,
        estimator: &TokenEstimator,
    ) -> std::result::Result<Self, MalformedPayload> {
        let payload = ChunkPayload::from_map(&hit.payload)?;
        let scope_key = payload
            .file_name
            .clone()
            .map(ScopeKey::File)
            .or_else(|| payload.domain.clone().map(ScopeKey::Domain));
        Ok(Self {
            id: hit.id.clone(),
            estimated_tokens: estimator.estimate_with_hint(&payload.text, payload.token_count),
            source_id: payload.source_id(&hit.id),
            scope_key,
            title: payload.page_title,
            url: payload.url,
            chunk_index: payload.chunk_index,
            similarity_score: hit.score,
            original_rank,
            text: payload.text,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query_text: String,
    /// `None` searches the whole collection.
    pub scope_key: Option<ScopeKey>,
    /// Must be positive when present.
    pub manual_top_k: Option<i64>,
    pub diversify: bool,
    pub score_threshold: Option<f32>,
}

impl RetrievalRequest {
    #[must_use]
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            scope_key: None,
            manual_top_k: None,
            diversify: true,
            score_threshold: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeKey) -> Self {
        self.scope_key = Some(scope);
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.manual_top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn with_diversify(mut self, diversify: bool) -> Self {
        self.diversify = diversify;
        self
    }

    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Check caller-supplied values before any retrieval work.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidOverride`] for a non-positive `manual_top_k` and
    /// [`RetrievalError::InvalidThreshold`] for a non-finite `score_threshold`.
    pub fn validate(&self) -> Result<Option<NonZeroUsize>> {
        if let Some(t) = self.score_threshold
            && !t.is_finite()
        {
            return Err(RetrievalError::InvalidThreshold { value: t });
        }
        self.manual_top_k
            .map(|k| {
                usize::try_from(k)
                    .ok()
                    .and_then(NonZeroUsize::new)
                    .ok_or_else(|| RetrievalError::InvalidOverride {
                        value: k.to_string(),
                    })
            })
            .transpose()
    }
}

/// Parse a textual top-k override such as a CLI argument.
///
/// # Errors
///
/// Returns [`RetrievalError::InvalidOverride`] if `raw` is not a positive integer.
pub fn parse_top_k(raw: &str) -> Result<i64> {
    let invalid = || RetrievalError::InvalidOverride {
        value: raw.to_owned(),
    };
    let k: i64 = raw.trim().parse().map_err(|_| invalid())?;
    if k <= 0 {
        return Err(invalid());
    }
    Ok(k)
}

/// Hard ceiling on the assembled context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBudget {
    max_context_tokens: usize,
    reserved_overhead_tokens: usize,
}

impl TokenBudget {
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidBudget`] unless the reserve leaves room for content.
    pub fn new(max_context_tokens: usize, reserved_overhead_tokens: usize) -> Result<Self> {
        if reserved_overhead_tokens >= max_context_tokens {
            return Err(RetrievalError::InvalidBudget {
                max_context_tokens,
                reserved_overhead_tokens,
            });
        }
        Ok(Self {
            max_context_tokens,
            reserved_overhead_tokens,
        })
    }

    #[must_use]
    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    #[must_use]
    pub fn reserved_overhead_tokens(&self) -> usize {
        self.reserved_overhead_tokens
    }

    /// Tokens available for chunks.
    #[must_use]
    pub fn available(&self) -> usize {
        self.max_context_tokens - self.reserved_overhead_tokens
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_context_tokens: 150_000,
            reserved_overhead_tokens: 0,
        }
    }
}

/// Present on a result whose packing stopped on the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TruncationInfo {
    pub chunks_included: usize,
    pub chunks_considered: usize,
    pub available_tokens: usize,
}

/// Non-error outcomes that explain an empty or partial result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    EmptyQuery,
    UnknownScope {
        scope: ScopeKey,
    },
    NoCandidates,
    BudgetExceededAtZero {
        first_chunk_tokens: usize,
        available_tokens: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuery => f.write_str("query is empty"),
            Self::UnknownScope { scope } => write!(f, "scope {scope} matches no stored chunks"),
            Self::NoCandidates => f.write_str("no candidate chunks matched the query"),
            Self::BudgetExceededAtZero {
                first_chunk_tokens,
                available_tokens,
            } => write!(
                f,
                "top chunk needs {first_chunk_tokens} tokens but only {available_tokens} are available"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    /// Included chunks in final order.
    pub chunks: Vec<Chunk>,
    pub chunks_considered: usize,
    pub chunks_included: usize,
    /// Raw hits returned by the vector store before threshold and diversity.
    pub candidates_fetched: usize,
    pub truncated: bool,
    pub truncation: Option<TruncationInfo>,
    /// Each `source_id` once, in order of first appearance among `chunks`.
    pub citations: Vec<String>,
    pub estimated_tokens: usize,
    pub context: String,
    pub intent: Option<QueryIntent>,
    pub top_k: Option<TopKDecision>,
    pub diagnostic: Option<Diagnostic>,
}

impl RetrievalResult {
    #[must_use]
    pub fn empty(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostic: Some(diagnostic),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn hit(payload: serde_json::Value) -> ScoredVectorPoint {
        ScoredVectorPoint {
            id: "p-1".into(),
            score: 0.7,
            payload: serde_json::from_value::<HashMap<_, _>>(payload).unwrap(),
        }
    }

    #[test]
    fn chunk_from_hit_reads_payload() {
        let chunk = Chunk::from_hit(
            &hit(serde_json::json!({
                "text": "abcdefgh",
                "domain": "example.org",
                "url": "https://example.org/a",
                "page_title": "A",
            })),
            3,
            &TokenEstimator::default(),
        )
        .unwrap();
        assert_eq!(chunk.estimated_tokens, 2);
        assert_eq!(chunk.source_id, "https://example.org/a");
        assert_eq!(chunk.scope_key, Some(ScopeKey::Domain("example.org".into())));
        assert_eq!(chunk.title.as_deref(), Some("A"));
        assert_eq!(chunk.original_rank, 3);
    }

    #[test]
    fn chunk_from_hit_prefers_token_count() {
        let chunk = Chunk::from_hit(
            &hit(serde_json::json!({"text": "abcdefgh", "token_count": 9, "file_name": "f.pdf"})),
            0,
            &TokenEstimator::default(),
        )
        .unwrap();
        assert_eq!(chunk.estimated_tokens, 9);
        assert_eq!(chunk.scope_key, Some(ScopeKey::File("f.pdf".into())));
    }

    #[test]
    fn chunk_from_hit_rejects_missing_text() {
        let err = Chunk::from_hit(
            &hit(serde_json::json!({"file_name": "f.pdf"})),
            0,
            &TokenEstimator::default(),
        )
        .unwrap_err();
        assert_eq!(err.field, "text");
    }

    #[test]
    fn validate_override() {
        assert_eq!(RetrievalRequest::new("q").validate().unwrap(), None);
        assert_eq!(
            RetrievalRequest::new("q").with_top_k(7).validate().unwrap(),
            NonZeroUsize::new(7)
        );
        for bad in [0, -4] {
            let err = RetrievalRequest::new("q").with_top_k(bad).validate().unwrap_err();
            assert!(matches!(err, RetrievalError::InvalidOverride { .. }));
        }
    }

    #[test]
    fn validate_threshold() {
        let err = RetrievalRequest::new("q")
            .with_score_threshold(f32::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidThreshold { .. }));
    }

    #[test]
    fn parse_top_k_text() {
        assert_eq!(parse_top_k(" 25 ").unwrap(), 25);
        for bad in ["abc", "0", "-1", "2.5", ""] {
            assert!(
                matches!(parse_top_k(bad), Err(RetrievalError::InvalidOverride { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn budget_rejects_full_reserve() {
        assert!(TokenBudget::new(100, 100).is_err());
        let b = TokenBudget::new(150_000, 2_000).unwrap();
        assert_eq!(b.available(), 148_000);
        assert_eq!(TokenBudget::default().available(), 150_000);
    }

    #[test]
    fn diagnostic_serializes_with_kind() {
        let json = serde_json::to_value(Diagnostic::UnknownScope {
            scope: ScopeKey::File("missing.pdf".into()),
        })
        .unwrap();
        assert_eq!(json["kind"], "unknown_scope");
        assert_eq!(json["scope"], "missing.pdf");
    }
}
