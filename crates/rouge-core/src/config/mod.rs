mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};
use rouge_retrieval::IntentClassifier;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject values the retrieval engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.retrieval;
        for (name, value) in [
            ("retrieval.simple_fraction", r.simple_fraction),
            ("retrieval.completeness_fraction", r.completeness_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                bail!("{name} must be in (0, 1], got {value}");
            }
        }
        if !(0.0..=1.0).contains(&r.diversity_lambda) {
            bail!(
                "retrieval.diversity_lambda must be in [0, 1], got {}",
                r.diversity_lambda
            );
        }
        if r.oversample_factor == 0 {
            bail!("retrieval.oversample_factor must be at least 1");
        }
        if r.max_candidates == 0 {
            bail!("retrieval.max_candidates must be at least 1");
        }
        if r.absolute_cap == 0 {
            bail!("retrieval.absolute_cap must be at least 1");
        }
        if r.max_candidates < r.absolute_cap {
            bail!(
                "retrieval.max_candidates ({}) must be at least absolute_cap ({})",
                r.max_candidates,
                r.absolute_cap
            );
        }
        if !r.chars_per_token.is_finite() || r.chars_per_token <= 0.0 {
            bail!(
                "retrieval.chars_per_token must be positive, got {}",
                r.chars_per_token
            );
        }
        if r.reserved_overhead_tokens >= r.max_context_tokens {
            bail!(
                "retrieval.reserved_overhead_tokens ({}) must be below max_context_tokens ({})",
                r.reserved_overhead_tokens,
                r.max_context_tokens
            );
        }
        if let Some(threshold) = r.default_score_threshold
            && !threshold.is_finite()
        {
            bail!("retrieval.default_score_threshold must be finite");
        }
        if self.intent.patterns.is_empty()
            && IntentClassifier::for_language(&self.intent.language).is_none()
        {
            bail!("unknown intent language: {}", self.intent.language);
        }
        if self.vector_store.collection.trim().is_empty() {
            bail!("vector_store.collection must not be empty");
        }
        if self.embedding.provider == ProviderKind::OpenAi && self.secrets.openai_api_key.is_none()
        {
            bail!("embedding provider openai requires ROUGE_OPENAI_API_KEY");
        }
        Ok(())
    }

    /// Intent classifier for the configured language, or the explicit pattern list.
    ///
    /// # Errors
    ///
    /// Returns an error if the language has no built-in pattern set.
    pub fn intent_classifier(&self) -> anyhow::Result<IntentClassifier> {
        if !self.intent.patterns.is_empty() {
            return Ok(IntentClassifier::from_patterns(&self.intent.patterns));
        }
        IntentClassifier::for_language(&self.intent.language)
            .with_context(|| format!("unknown intent language: {}", self.intent.language))
    }
}
