#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scope key: {0:?}")]
    InvalidScope(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::VectorStoreError;

    #[test]
    fn vector_store_error_converts() {
        let err: MemoryError = VectorStoreError::Search("timed out".into()).into();
        assert_eq!(err.to_string(), "vector store error: search error: timed out");
    }

    #[test]
    fn invalid_scope_display() {
        let err = MemoryError::InvalidScope(String::new());
        assert_eq!(err.to_string(), "invalid scope key: \"\"");
    }
}
