//! Vector store access, stored chunk payloads and per-scope statistics.

pub mod error;
pub mod in_memory_store;
pub mod payload;
pub mod qdrant_ops;
pub mod scope;
pub mod stats;
pub mod tokens;
pub mod vector_store;

pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use payload::{ChunkPayload, MalformedPayload};
pub use qdrant_ops::QdrantOps;
pub use scope::ScopeKey;
pub use stats::{
    RecommendedRanges, ScopeStats, ScopeStatsProvider, StatsSnapshot, compute_stats,
};
pub use tokens::TokenEstimator;
pub use vector_store::{
    FieldCondition, FieldValue, ScoredVectorPoint, StoredPayload, VectorFilter, VectorPoint,
    VectorStore, VectorStoreError,
};
