//! Application bootstrap: config resolution, embedder/store construction, retriever wiring.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rouge_llm::{AnyEmbedder, EmbeddingProvider};
use rouge_llm::ollama::OllamaEmbedder;
use rouge_llm::openai::OpenAiEmbedder;
use rouge_memory::{QdrantOps, ScopeStatsProvider, StatsSnapshot, TokenEstimator, VectorStore};
use rouge_retrieval::{
    DiversitySelector, RetrievalSettings, Retriever, TokenBudget, TopKPolicy,
};

use crate::config::{Config, ProviderKind};

pub struct AppBuilder {
    config: Config,
}

impl AppBuilder {
    /// Resolve, load and validate config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be read, parsed or fails validation.
    pub fn from_path(cli_path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = resolve_config_path(cli_path);
        let config = Config::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        config.validate()?;
        tracing::debug!(
            path = %config_path.display(),
            provider = %config.embedding.provider,
            collection = %config.vector_store.collection,
            "config loaded"
        );
        Ok(Self { config })
    }

    /// Connect to Qdrant and wire a retriever serving the saved stats snapshot.
    ///
    /// Without a saved snapshot every scoped request reports an unknown scope until
    /// [`AppBuilder::refresh_stats`] has run.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedder or the Qdrant client cannot be created, or the
    /// saved snapshot cannot be read.
    pub fn build_retriever(&self) -> anyhow::Result<Retriever<AnyEmbedder>> {
        let retriever = self.connect()?;
        load_stats(&self.config, retriever.stats())?;
        Ok(retriever)
    }

    /// Rescan the collection and save the snapshot later queries load.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be scrolled or the snapshot cannot be written.
    pub async fn refresh_stats(&self) -> anyhow::Result<Arc<StatsSnapshot>> {
        let retriever = self.connect()?;
        if let Err(e) = load_stats(&self.config, retriever.stats()) {
            tracing::warn!("replacing unreadable stats snapshot: {e:#}");
        }
        refresh_and_save_stats(&self.config, &retriever).await
    }

    fn connect(&self) -> anyhow::Result<Retriever<AnyEmbedder>> {
        let embedder = create_embedder(&self.config)?;
        let store = QdrantOps::new(&self.config.vector_store.qdrant_url)
            .with_context(|| format!("connecting to {}", self.config.vector_store.qdrant_url))?;
        build_retriever_with(&self.config, embedder, Arc::new(store))
    }
}

/// Install the snapshot saved at `vector_store.stats_path`. Returns whether one was found.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_stats(config: &Config, provider: &ScopeStatsProvider) -> anyhow::Result<bool> {
    let path = &config.vector_store.stats_path;
    let loaded = StatsSnapshot::load(path, &config.vector_store.collection)
        .with_context(|| format!("reading stats snapshot {}", path.display()))?;
    let Some(snapshot) = loaded else {
        tracing::warn!(
            path = %path.display(),
            "no stats snapshot; run `rouge refresh-stats` before scoped queries"
        );
        return Ok(false);
    };
    provider.install(snapshot);
    Ok(true)
}

/// Recompute stats through `retriever` and save the installed snapshot.
///
/// # Errors
///
/// Returns an error if the store cannot be scrolled or the snapshot cannot be written.
pub async fn refresh_and_save_stats<E: EmbeddingProvider>(
    config: &Config,
    retriever: &Retriever<E>,
) -> anyhow::Result<Arc<StatsSnapshot>> {
    retriever
        .refresh_stats()
        .await
        .context("failed to compute scope statistics")?;
    let snapshot = retriever.stats().snapshot();
    let path = &config.vector_store.stats_path;
    snapshot
        .save(path, &config.vector_store.collection)
        .with_context(|| format!("writing stats snapshot {}", path.display()))?;
    Ok(snapshot)
}

/// Priority: `--config` > `ROUGE_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_owned();
    }
    if let Ok(path) = std::env::var("ROUGE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the `OpenAI` key is missing.
pub fn create_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let embedding = &config.embedding;
    match embedding.provider {
        ProviderKind::OpenAi => {
            let api_key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("ROUGE_OPENAI_API_KEY not found")?
                .expose()
                .to_owned();
            let client =
                rouge_llm::http::default_client(Duration::from_secs(embedding.timeout_seconds))?;
            let embedder = OpenAiEmbedder::new(
                client,
                api_key,
                embedding.base_url.clone(),
                embedding.model.clone(),
            )?;
            Ok(AnyEmbedder::OpenAi(embedder))
        }
        ProviderKind::Ollama => Ok(AnyEmbedder::Ollama(OllamaEmbedder::new(
            &embedding.base_url,
            embedding.model.clone(),
        ))),
        #[cfg(feature = "mock")]
        ProviderKind::Mock => Ok(AnyEmbedder::Mock(rouge_llm::mock::MockEmbedder::default())),
    }
}

#[must_use]
pub fn topk_policy(config: &Config) -> TopKPolicy {
    let r = &config.retrieval;
    TopKPolicy {
        simple_fraction: r.simple_fraction,
        completeness_fraction: r.completeness_fraction,
        simple_fallback_k: r.simple_fallback_k,
        completeness_fallback_k: r.completeness_fallback_k,
        absolute_cap: r.absolute_cap,
    }
}

/// # Errors
///
/// Returns an error if the token budget is inconsistent.
pub fn retrieval_settings(config: &Config) -> anyhow::Result<RetrievalSettings> {
    let r = &config.retrieval;
    let budget = TokenBudget::new(r.max_context_tokens, r.reserved_overhead_tokens)?;
    Ok(RetrievalSettings {
        collection: config.vector_store.collection.clone(),
        search_timeout: Duration::from_millis(config.vector_store.search_timeout_ms),
        oversample_factor: r.oversample_factor,
        max_candidates: r.max_candidates,
        default_score_threshold: r.default_score_threshold,
        budget,
    })
}

/// Wire a retriever over an already constructed embedder and store.
///
/// # Errors
///
/// Returns an error if the budget or intent settings are invalid.
pub fn build_retriever_with(
    config: &Config,
    embedder: AnyEmbedder,
    store: Arc<dyn VectorStore>,
) -> anyhow::Result<Retriever<AnyEmbedder>> {
    let settings = retrieval_settings(config)?;
    let classifier = config.intent_classifier()?;
    let stats = Arc::new(ScopeStatsProvider::new());
    tracing::info!(
        provider = embedder.name(),
        collection = %settings.collection,
        available_tokens = settings.budget.available(),
        patterns = classifier.patterns().len(),
        "retriever ready"
    );
    Ok(Retriever::new(Arc::new(embedder), store, stats, settings)
        .with_classifier(classifier)
        .with_policy(topk_policy(config))
        .with_diversity(DiversitySelector::new(config.retrieval.diversity_lambda))
        .with_estimator(TokenEstimator::new(config.retrieval.chars_per_token)))
}
