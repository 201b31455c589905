use repolens_index::IndexError;
use repolens_llm::LlmError;

/// Errors surfaced by a chat turn or by repository bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The language model call failed or its reply did not match the schema.
    #[error("model invocation failed: {0}")]
    ModelInvocation(#[source] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] IndexError),

    /// A configured remote provider has no API key.
    #[error("missing credential: set {key}")]
    MissingCredential { key: String },

    #[error("repository not found: {0}")]
    RepoNotFound(String),

    #[error("repository registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LlmError> for ChatError {
    fn from(e: LlmError) -> Self {
        Self::ModelInvocation(e)
    }
}

impl From<IndexError> for ChatError {
    fn from(e: IndexError) -> Self {
        Self::Retrieval(e)
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
