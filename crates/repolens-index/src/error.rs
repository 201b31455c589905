//! Error types for repolens-index.

use repolens_llm::LlmError;

/// Errors raised while chunking, indexing or querying a repository.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The file extension has no entry in the language table.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The embedding provider failed; the vectorization run is abandoned.
    #[error("embedding provider failed: {0}")]
    Embedding(#[source] LlmError),

    /// No persisted index exists for the repository.
    #[error("no index found for repository {repo_id}; vectorize it first")]
    IndexNotFound { repo_id: String },

    /// The index exists but holds no chunks to search.
    #[error("the index for {repo_id} is empty")]
    RetrievalEmpty { repo_id: String },

    /// Query vector and stored vectors disagree on length.
    #[error("embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Bad chunk size, overlap or concurrency setting.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The persisted index was written by an incompatible version.
    #[error("unsupported index format version {0}")]
    FormatVersion(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("walk failed: {0}")]
    Walk(#[from] ignore::Error),

    /// An indexing worker panicked or was cancelled.
    #[error("indexing worker failed: {0}")]
    Worker(String),
}

impl From<LlmError> for IndexError {
    fn from(e: LlmError) -> Self {
        Self::Embedding(e)
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
