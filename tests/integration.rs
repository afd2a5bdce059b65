use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use rouge_core::Config;
use rouge_core::bootstrap::{build_retriever_with, load_stats, refresh_and_save_stats};
use rouge_core::config::ProviderKind;
use rouge_llm::AnyEmbedder;
use rouge_llm::mock::MockEmbedder;
use rouge_memory::{InMemoryVectorStore, ScopeKey, VectorPoint, VectorStore};
use rouge_retrieval::{Diagnostic, QueryIntent, RetrievalRequest};
use serial_test::serial;

const COLLECTION: &str = "guides";

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{content}").unwrap();
    file
}

/// 40 chunks of `guida.pdf` at 100 tokens each.
async fn guide_store() -> Arc<dyn VectorStore> {
    let store = InMemoryVectorStore::new();
    store.ensure_collection(COLLECTION, 3).await.unwrap();
    store.upsert(COLLECTION, guide_points(0..40)).await.unwrap();
    Arc::new(store)
}

fn guide_points(range: std::ops::Range<u32>) -> Vec<VectorPoint> {
    range
        .map(|i| VectorPoint {
            id: format!("g-{i:02}"),
            vector: vec![1.0, f32::from(u8::try_from(i).unwrap()) / 40.0, 0.0],
            payload: HashMap::from([
                (
                    "text".into(),
                    serde_json::json!(format!("capitolo {i} paragrafo {} sezione {}", i % 7, i % 5)),
                ),
                ("file_name".into(), serde_json::json!("guida.pdf")),
                ("chunk_index".into(), serde_json::json!(i)),
                ("token_count".into(), serde_json::json!(100)),
            ]),
        })
        .collect()
}

#[test]
#[serial]
fn shipped_default_config_validates() {
    unsafe { std::env::set_var("ROUGE_OPENAI_API_KEY", "sk-test") };
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = Config::load(&path).unwrap();
    unsafe { std::env::remove_var("ROUGE_OPENAI_API_KEY") };

    config.validate().unwrap();
    let defaults = Config::default();
    assert_eq!(config.embedding.provider, defaults.embedding.provider);
    assert_eq!(config.vector_store.collection, defaults.vector_store.collection);
    assert_eq!(
        config.retrieval.max_context_tokens,
        defaults.retrieval.max_context_tokens
    );
    assert_eq!(config.retrieval.absolute_cap, defaults.retrieval.absolute_cap);
    assert_eq!(config.intent.language, "en");
}

#[tokio::test]
#[serial]
async fn config_file_drives_retrieval() {
    let file = write_config(
        r#"
[embedding]
provider = "ollama"

[vector_store]
collection = "guides"

[retrieval]
max_context_tokens = 1000
absolute_cap = 3

[intent]
language = "it"
"#,
    );
    let config = Config::load(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.embedding.provider, ProviderKind::Ollama);

    let embedder = AnyEmbedder::Mock(MockEmbedder::with_embedding(vec![1.0, 0.0, 0.0]));
    let retriever = build_retriever_with(&config, embedder, guide_store().await).unwrap();
    retriever.refresh_stats().await.unwrap();

    let result = retriever
        .retrieve(
            &RetrievalRequest::new("elenca tutti i capitoli")
                .with_scope(ScopeKey::File("guida.pdf".into())),
        )
        .await
        .unwrap();

    assert_eq!(result.intent, Some(QueryIntent::Completeness));
    let decision = result.top_k.as_ref().unwrap();
    assert_eq!(decision.requested_k, 16);
    assert_eq!(decision.ceiling, Some(10));
    assert_eq!(decision.target_k, 3);
    assert!(decision.ceiling_applied);
    assert_eq!(result.chunks_included, 3);
    assert_eq!(result.estimated_tokens, 300);
    assert_eq!(result.citations, ["guida.pdf"]);
    assert!(!result.truncated);
    assert!(result.context.starts_with("<retrieved_context>"));
}

#[tokio::test]
#[serial]
async fn env_override_shrinks_budget() {
    let file = write_config("[embedding]\nprovider = \"ollama\"\n[vector_store]\ncollection = \"guides\"\n");
    unsafe { std::env::set_var("ROUGE_MAX_CONTEXT_TOKENS", "250") };
    let config = Config::load(file.path()).unwrap();
    unsafe { std::env::remove_var("ROUGE_MAX_CONTEXT_TOKENS") };
    config.validate().unwrap();

    let embedder = AnyEmbedder::Mock(MockEmbedder::default());
    let retriever = build_retriever_with(&config, embedder, guide_store().await).unwrap();
    retriever.refresh_stats().await.unwrap();

    let result = retriever
        .retrieve(
            &RetrievalRequest::new("what is in chapter 3")
                .with_scope(ScopeKey::File("guida.pdf".into())),
        )
        .await
        .unwrap();

    let decision = result.top_k.as_ref().unwrap();
    assert_eq!(decision.ceiling, Some(2));
    assert_eq!(decision.target_k, 2);
    assert_eq!(result.chunks_included, 2);
    assert!(result.estimated_tokens <= 250);
}

#[tokio::test]
#[serial]
async fn unknown_scope_is_a_diagnostic() {
    let file = write_config("[embedding]\nprovider = \"ollama\"\n[vector_store]\ncollection = \"guides\"\n");
    let config = Config::load(file.path()).unwrap();

    let embedder = AnyEmbedder::Mock(MockEmbedder::default());
    let retriever = build_retriever_with(&config, embedder, guide_store().await).unwrap();
    retriever.refresh_stats().await.unwrap();

    let scope = ScopeKey::Domain("missing.example".into());
    let result = retriever
        .retrieve(&RetrievalRequest::new("anything").with_scope(scope.clone()))
        .await
        .unwrap();
    assert_eq!(result.diagnostic, Some(Diagnostic::UnknownScope { scope }));
    assert_eq!(result.chunks_included, 0);
    assert!(result.context.is_empty());
}

#[tokio::test]
#[serial]
async fn saved_stats_serve_later_queries_without_rescan() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config("[embedding]\nprovider = \"ollama\"\n[vector_store]\ncollection = \"guides\"\n");
    let mut config = Config::load(file.path()).unwrap();
    config.vector_store.stats_path = dir.path().join("rouge-stats.json");

    let store = guide_store().await;
    let embedder = AnyEmbedder::Mock(MockEmbedder::with_embedding(vec![1.0, 0.0, 0.0]));
    let writer = build_retriever_with(&config, embedder.clone(), Arc::clone(&store)).unwrap();
    let saved = refresh_and_save_stats(&config, &writer).await.unwrap();
    assert_eq!(saved.version, 1);

    // Chunks ingested after the refresh stay invisible until the next one.
    store.upsert(COLLECTION, guide_points(40..80)).await.unwrap();

    let reader = build_retriever_with(&config, embedder, store).unwrap();
    assert!(load_stats(&config, reader.stats()).unwrap());
    assert_eq!(reader.stats().version(), 1);

    let result = reader
        .retrieve(
            &RetrievalRequest::new("list all chapters")
                .with_scope(ScopeKey::File("guida.pdf".into())),
        )
        .await
        .unwrap();
    assert_eq!(result.diagnostic, None);
    assert_eq!(result.top_k.as_ref().unwrap().requested_k, 16);
    assert_eq!(
        reader
            .stats()
            .get_stats(&ScopeKey::File("guida.pdf".into()))
            .unwrap()
            .total_chunk_count,
        40
    );
}

#[tokio::test]
#[serial]
async fn missing_stats_snapshot_means_unknown_scope() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config("[embedding]\nprovider = \"ollama\"\n[vector_store]\ncollection = \"guides\"\n");
    let mut config = Config::load(file.path()).unwrap();
    config.vector_store.stats_path = dir.path().join("absent.json");

    let embedder = AnyEmbedder::Mock(MockEmbedder::default());
    let retriever = build_retriever_with(&config, embedder, guide_store().await).unwrap();
    assert!(!load_stats(&config, retriever.stats()).unwrap());

    let scope = ScopeKey::File("guida.pdf".into());
    let result = retriever
        .retrieve(&RetrievalRequest::new("anything").with_scope(scope.clone()))
        .await
        .unwrap();
    assert_eq!(result.diagnostic, Some(Diagnostic::UnknownScope { scope }));
}
