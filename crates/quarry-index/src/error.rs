//! Error types for quarry-index.

/// Errors that can occur during chunking, storage, or ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading or writing the store file or a source document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error on the persisted store.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid chunker configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File extension outside the supported set.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Source file exceeds the ingestion size ceiling.
    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    /// Non-empty document that chunked to nothing.
    #[error("document produced no chunks after processing")]
    EmptyDocument,

    /// Chunk and embedding sequences are not parallel.
    #[error("chunk/embedding count mismatch: {chunks} chunks, {embeddings} embeddings")]
    ChunkEmbeddingMismatch { chunks: usize, embeddings: usize },

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
