//! Request pipeline: classify, size, fetch, diversify, pack, format.

use std::sync::Arc;
use std::time::Duration;

use rouge_llm::EmbeddingProvider;
use rouge_memory::{ScopeStatsProvider, ScoredVectorPoint, TokenEstimator, VectorStore};
use tokio_util::sync::CancellationToken;

use crate::budget::assemble;
use crate::diversity::{DiversitySelector, take_top};
use crate::error::{Result, RetrievalError};
use crate::format::format_result;
use crate::intent::IntentClassifier;
use crate::topk::TopKPolicy;
use crate::types::{Chunk, Diagnostic, RetrievalRequest, RetrievalResult, TokenBudget};

/// Per-deployment knobs for the fetch stage and budget.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub collection: String,
    pub search_timeout: Duration,
    /// Candidates fetched per target chunk when diversifying.
    pub oversample_factor: usize,
    /// Upper bound on candidates fetched for one request.
    pub max_candidates: usize,
    pub default_score_threshold: Option<f32>,
    pub budget: TokenBudget,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            collection: "rouge_chunks".into(),
            search_timeout: Duration::from_secs(10),
            oversample_factor: 3,
            max_candidates: 2000,
            default_score_threshold: None,
            budget: TokenBudget::default(),
        }
    }
}

impl RetrievalSettings {
    /// Number of candidates to request for `target_k`.
    #[must_use]
    pub fn fetch_k(&self, target_k: usize, diversify: bool) -> usize {
        let wanted = if diversify {
            target_k.saturating_mul(self.oversample_factor.max(1))
        } else {
            target_k
        };
        wanted.min(self.max_candidates).max(1)
    }
}

/// Adaptive retriever over one vector collection.
pub struct Retriever<E: EmbeddingProvider> {
    embedder: Arc<E>,
    store: Arc<dyn VectorStore>,
    stats: Arc<ScopeStatsProvider>,
    classifier: IntentClassifier,
    policy: TopKPolicy,
    diversity: DiversitySelector,
    estimator: TokenEstimator,
    settings: RetrievalSettings,
}

impl<E: EmbeddingProvider> std::fmt::Debug for Retriever<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.name())
            .field("classifier", &self.classifier)
            .field("policy", &self.policy)
            .field("diversity", &self.diversity)
            .field("estimator", &self.estimator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<E: EmbeddingProvider> Retriever<E> {
    #[must_use]
    pub fn new(
        embedder: Arc<E>,
        store: Arc<dyn VectorStore>,
        stats: Arc<ScopeStatsProvider>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            stats,
            classifier: IntentClassifier::english(),
            policy: TopKPolicy::default(),
            diversity: DiversitySelector::default(),
            estimator: TokenEstimator::default(),
            settings,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: TopKPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_diversity(mut self, diversity: DiversitySelector) -> Self {
        self.diversity = diversity;
        self
    }

    #[must_use]
    pub fn with_estimator(mut self, estimator: TokenEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<ScopeStatsProvider> {
        &self.stats
    }

    #[must_use]
    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Recompute scope stats from the store and install them.
    ///
    /// Returns `None` when an overlapping refresh installed a newer snapshot first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be scrolled.
    pub async fn refresh_stats(
        &self,
    ) -> std::result::Result<Option<u64>, rouge_memory::MemoryError> {
        self.stats
            .refresh(
                self.store.as_ref(),
                &self.settings.collection,
                &self.estimator,
            )
            .await
    }

    /// Run the full pipeline for `request`.
    ///
    /// # Errors
    ///
    /// See [`Retriever::retrieve_with_cancel`].
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        self.retrieve_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Run the full pipeline, aborting the candidate fetch when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidOverride`] or [`RetrievalError::InvalidThreshold`]
    /// before any work, [`RetrievalError::ZeroTargetK`] when nothing fits the budget, and
    /// [`RetrievalError::UpstreamUnavailable`] when embedding or search fails, times out or
    /// is cancelled.
    pub async fn retrieve_with_cancel(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        let manual = request.validate()?;
        let scope = request.scope_key.as_ref();
        tracing::debug!(stage = "received", ?scope, manual_top_k = ?manual, "retrieval request");

        if request.query_text.trim().is_empty() {
            return Ok(RetrievalResult::empty(Diagnostic::EmptyQuery));
        }

        let intent = self.classifier.classify(&request.query_text);
        tracing::debug!(stage = "classified", ?intent);

        let stats = match scope {
            Some(key) => match self.stats.get_stats(key) {
                Some(s) => Some(s),
                None => {
                    tracing::info!(scope = %key, "scope matches no stored chunks");
                    let mut result = RetrievalResult::empty(Diagnostic::UnknownScope {
                        scope: key.clone(),
                    });
                    result.intent = Some(intent);
                    return Ok(result);
                }
            },
            None => None,
        };

        let budget = self.settings.budget;
        let decision = self
            .policy
            .select_k(stats.as_ref(), intent, manual, &budget)?;
        let target_k = decision.target_k;
        let fetch_k = self.settings.fetch_k(target_k, request.diversify);
        tracing::debug!(
            stage = "k_computed",
            target_k,
            fetch_k,
            rationale = %decision.rationale
        );

        let hits = self.fetch(request, fetch_k, cancel).await?;
        let candidates_fetched = hits.len();
        let threshold = request
            .score_threshold
            .or(self.settings.default_score_threshold);
        let candidates = self.to_chunks(&hits, threshold);
        tracing::debug!(
            stage = "candidates_fetched",
            fetched = candidates_fetched,
            usable = candidates.len(),
            ?threshold
        );

        if candidates.is_empty() {
            let mut result = RetrievalResult::empty(Diagnostic::NoCandidates);
            result.candidates_fetched = candidates_fetched;
            result.intent = Some(intent);
            result.top_k = Some(decision);
            return Ok(result);
        }

        let selected = if request.diversify {
            self.diversity.select(&candidates, target_k)
        } else {
            take_top(&candidates, target_k)
        };
        tracing::debug!(stage = "diversified", selected = selected.len());

        let chunks_considered = selected.len();
        let assembly = assemble(&selected, &budget);
        tracing::debug!(
            stage = "budgeted",
            included = assembly.included.len(),
            tokens = assembly.total_tokens,
            truncated = assembly.truncated
        );

        let at_zero = assembly.truncated && assembly.included.is_empty();
        let mut result = format_result(
            assembly.included,
            assembly.truncated,
            chunks_considered,
            budget.available(),
        );
        result.candidates_fetched = candidates_fetched;
        result.intent = Some(intent);
        result.top_k = Some(decision);
        if at_zero {
            result.diagnostic = Some(Diagnostic::BudgetExceededAtZero {
                first_chunk_tokens: selected[0].estimated_tokens,
                available_tokens: budget.available(),
            });
        }
        tracing::debug!(stage = "formatted", citations = result.citations.len());

        tracing::info!(
            ?scope,
            ?intent,
            target_k,
            fetched = candidates_fetched,
            considered = result.chunks_considered,
            included = result.chunks_included,
            tokens = result.estimated_tokens,
            truncated = result.truncated,
            "retrieval complete"
        );
        Ok(result)
    }

    async fn fetch(
        &self,
        request: &RetrievalRequest,
        fetch_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredVectorPoint>> {
        let timeout = self.settings.search_timeout;
        let work = async {
            let vector = self
                .embedder
                .embed(&request.query_text)
                .await
                .map_err(|e| RetrievalError::embedding(&e))?;
            let filter = request.scope_key.as_ref().map(rouge_memory::ScopeKey::to_filter);
            self.store
                .search(
                    &self.settings.collection,
                    vector,
                    fetch_k as u64,
                    filter,
                )
                .await
                .map_err(|e| RetrievalError::vector_store(e.to_string()))
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::warn!("candidate fetch cancelled");
                Err(RetrievalError::vector_store("cancelled"))
            }
            res = tokio::time::timeout(timeout, work) => {
                res.map_err(|_| {
                    #[allow(clippy::cast_possible_truncation)]
                    let ms = timeout.as_millis() as u64;
                    tracing::warn!(timeout_ms = ms, "candidate fetch timed out");
                    RetrievalError::vector_store(format!("timed out after {ms}ms"))
                })?
            }
        }
    }

    fn to_chunks(&self, hits: &[ScoredVectorPoint], threshold: Option<f32>) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = hits
            .iter()
            .enumerate()
            .filter_map(|(rank, hit)| match Chunk::from_hit(hit, rank, &self.estimator) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(point_id = %hit.id, field = e.field, "skipping chunk: {e}");
                    None
                }
            })
            .filter(|c| threshold.is_none_or(|t| c.similarity_score >= t))
            .collect();
        chunks.sort_by(|a, b| {
            b.similarity_score
                .total_cmp(&a.similarity_score)
                .then(a.original_rank.cmp(&b.original_rank))
        });
        chunks
    }
}
