use std::collections::HashMap;

use rouge_memory::{
    QdrantOps, ScopeKey, ScopeStatsProvider, TokenEstimator, VectorPoint, VectorStore,
};
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);
const COLLECTION: &str = "test_chunks";
const VECTOR_SIZE: u64 = 4;

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

fn chunk(file: &str, index: u64, text: &str, vector: Vec<f32>) -> VectorPoint {
    VectorPoint {
        id: uuid::Uuid::new_v4().to_string(),
        vector,
        payload: HashMap::from([
            ("text".into(), serde_json::json!(text)),
            ("file_name".into(), serde_json::json!(file)),
            ("chunk_index".into(), serde_json::json!(index)),
        ]),
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn search_filters_by_scope() {
    let container = qdrant_image().start().await.unwrap();
    let port = container.get_host_port_ipv4(6334).await.unwrap();
    let qdrant = QdrantOps::new(&format!("http://127.0.0.1:{port}")).unwrap();
    VectorStore::ensure_collection(&qdrant, COLLECTION, VECTOR_SIZE)
        .await
        .unwrap();

    VectorStore::upsert(
        &qdrant,
        COLLECTION,
        vec![
            chunk("a.pdf", 0, "alpha one", vec![1.0, 0.0, 0.0, 0.0]),
            chunk("a.pdf", 1, "alpha two", vec![0.9, 0.1, 0.0, 0.0]),
            chunk("b.pdf", 0, "beta one", vec![1.0, 0.0, 0.0, 0.0]),
        ],
    )
    .await
    .unwrap();

    let scope = ScopeKey::File("a.pdf".into());
    let hits = VectorStore::search(
        &qdrant,
        COLLECTION,
        vec![1.0, 0.0, 0.0, 0.0],
        10,
        Some(scope.to_filter()),
    )
    .await
    .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.payload["file_name"] == "a.pdf"));
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn refresh_reads_all_payloads() {
    let container = qdrant_image().start().await.unwrap();
    let port = container.get_host_port_ipv4(6334).await.unwrap();
    let qdrant = QdrantOps::new(&format!("http://127.0.0.1:{port}")).unwrap();
    VectorStore::ensure_collection(&qdrant, COLLECTION, VECTOR_SIZE)
        .await
        .unwrap();

    let points: Vec<_> = (0..300)
        .map(|i| chunk("big.pdf", i, &"x".repeat(400), vec![0.5, 0.5, 0.0, 0.0]))
        .collect();
    VectorStore::upsert(&qdrant, COLLECTION, points).await.unwrap();

    let provider = ScopeStatsProvider::new();
    let installed = provider
        .refresh(&qdrant, COLLECTION, &TokenEstimator::default())
        .await
        .unwrap();
    assert_eq!(installed, Some(1));
    let stats = provider
        .get_stats(&ScopeKey::File("big.pdf".into()))
        .unwrap();
    assert_eq!(stats.total_chunk_count, 300);
    assert!((stats.avg_tokens_per_chunk - 100.0).abs() < f64::EPSILON);
}
