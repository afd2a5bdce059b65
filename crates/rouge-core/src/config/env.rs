use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_services();
        self.apply_env_overrides_retrieval();
    }

    fn apply_env_overrides_services(&mut self) {
        if let Ok(v) = std::env::var("ROUGE_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid ROUGE_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ROUGE_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("ROUGE_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("ROUGE_OPENAI_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("ROUGE_QDRANT_URL") {
            self.vector_store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("ROUGE_COLLECTION") {
            self.vector_store.collection = v;
        }
        if let Ok(v) = std::env::var("ROUGE_SEARCH_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.vector_store.search_timeout_ms = ms;
            } else {
                tracing::warn!("ignoring invalid ROUGE_SEARCH_TIMEOUT_MS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ROUGE_STATS_PATH")
            && !v.trim().is_empty()
        {
            self.vector_store.stats_path = v.into();
        }
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Ok(v) = std::env::var("ROUGE_MAX_CONTEXT_TOKENS") {
            if let Ok(tokens) = v.parse::<usize>() {
                self.retrieval.max_context_tokens = tokens;
            } else {
                tracing::warn!("ignoring invalid ROUGE_MAX_CONTEXT_TOKENS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ROUGE_RESERVED_OVERHEAD_TOKENS") {
            if let Ok(tokens) = v.parse::<usize>() {
                self.retrieval.reserved_overhead_tokens = tokens;
            } else {
                tracing::warn!("ignoring invalid ROUGE_RESERVED_OVERHEAD_TOKENS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ROUGE_ABSOLUTE_CAP") {
            if let Ok(cap) = v.parse::<usize>() {
                self.retrieval.absolute_cap = cap;
            } else {
                tracing::warn!("ignoring invalid ROUGE_ABSOLUTE_CAP value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ROUGE_DIVERSITY_LAMBDA") {
            if let Ok(lambda) = v.parse::<f64>() {
                self.retrieval.diversity_lambda = lambda;
            } else {
                tracing::warn!("ignoring invalid ROUGE_DIVERSITY_LAMBDA value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ROUGE_CHARS_PER_TOKEN") {
            if let Ok(ratio) = v.parse::<f64>() {
                self.retrieval.chars_per_token = ratio;
            } else {
                tracing::warn!("ignoring invalid ROUGE_CHARS_PER_TOKEN value: {v}");
            }
        }
        if let Ok(v) = std::env::var("ROUGE_INTENT_LANGUAGE") {
            self.intent.language = v;
        }
    }
}
