use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Ollama,
    #[cfg(feature = "mock")]
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            #[cfg(feature = "mock")]
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            timeout_seconds: default_embedding_timeout(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "rouge_chunks".into()
}

fn default_search_timeout_ms() -> u64 {
    10_000
}

fn default_stats_path() -> PathBuf {
    PathBuf::from("rouge-stats.json")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_search_timeout_ms")]
    pub search_timeout_ms: u64,
    /// Where `refresh-stats` saves the scope statistics snapshot that queries load.
    #[serde(default = "default_stats_path")]
    pub stats_path: PathBuf,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
            search_timeout_ms: default_search_timeout_ms(),
            stats_path: default_stats_path(),
        }
    }
}

fn default_max_context_tokens() -> usize {
    150_000
}

fn default_simple_fraction() -> f64 {
    0.10
}

fn default_completeness_fraction() -> f64 {
    0.40
}

fn default_simple_fallback_k() -> usize {
    20
}

fn default_completeness_fallback_k() -> usize {
    50
}

fn default_absolute_cap() -> usize {
    200
}

fn default_oversample_factor() -> usize {
    3
}

fn default_max_candidates() -> usize {
    2000
}

fn default_diversity_lambda() -> f64 {
    0.5
}

fn default_chars_per_token() -> f64 {
    4.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default)]
    pub reserved_overhead_tokens: usize,
    #[serde(default = "default_simple_fraction")]
    pub simple_fraction: f64,
    #[serde(default = "default_completeness_fraction")]
    pub completeness_fraction: f64,
    #[serde(default = "default_simple_fallback_k")]
    pub simple_fallback_k: usize,
    #[serde(default = "default_completeness_fallback_k")]
    pub completeness_fallback_k: usize,
    #[serde(default = "default_absolute_cap")]
    pub absolute_cap: usize,
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_diversity_lambda")]
    pub diversity_lambda: f64,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_score_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            reserved_overhead_tokens: 0,
            simple_fraction: default_simple_fraction(),
            completeness_fraction: default_completeness_fraction(),
            simple_fallback_k: default_simple_fallback_k(),
            completeness_fallback_k: default_completeness_fallback_k(),
            absolute_cap: default_absolute_cap(),
            oversample_factor: default_oversample_factor(),
            max_candidates: default_max_candidates(),
            diversity_lambda: default_diversity_lambda(),
            chars_per_token: default_chars_per_token(),
            default_score_threshold: None,
        }
    }
}

fn default_intent_language() -> String {
    "en".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntentConfig {
    #[serde(default = "default_intent_language")]
    pub language: String,
    /// Replaces the built-in pattern set for `language` when non-empty.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            language: default_intent_language(),
            patterns: Vec::new(),
        }
    }
}

/// API key wrapper that never prints its value.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Secrets resolved from the environment; never read from or written to TOML.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
}
