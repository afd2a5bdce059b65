//! Adaptive retrieval and context assembly.
//!
//! A request is classified for completeness intent, sized against scope statistics and the
//! token budget, fetched from the vector store with oversampling, thinned for redundancy,
//! packed under the budget and rendered with citations.

pub mod budget;
pub mod diversity;
pub mod error;
pub mod format;
pub mod intent;
pub mod retriever;
pub mod topk;
pub mod types;

pub use budget::{Assembly, assemble};
pub use diversity::DiversitySelector;
pub use error::{Result, RetrievalError};
pub use format::{format_result, render_context, render_sources};
pub use intent::{IntentClassifier, QueryIntent};
pub use retriever::{RetrievalSettings, Retriever};
pub use topk::{TopKDecision, TopKPolicy};
pub use types::{
    Chunk, Diagnostic, RetrievalRequest, RetrievalResult, TokenBudget, TruncationInfo,
    parse_top_k,
};
