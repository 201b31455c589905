#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("{provider} rejected the credential")]
    Unauthorized { provider: &'static str },

    #[error("missing credential for {provider}")]
    MissingCredential { provider: &'static str },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("structured output parse failed: {0}")]
    StructuredParse(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Fail fast when a remote provider is constructed or called without a key.
///
/// # Errors
///
/// Returns [`LlmError::MissingCredential`] when `key` is blank.
pub(crate) fn require_key(provider: &'static str, key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(LlmError::MissingCredential { provider });
    }
    Ok(())
}

/// Map a non-success HTTP status to the matching error kind.
pub(crate) fn status_error(
    provider: &'static str,
    status: reqwest::StatusCode,
    body: &str,
) -> LlmError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            LlmError::Unauthorized { provider }
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
        _ => {
            tracing::error!("{provider} API error {status}: {body}");
            LlmError::Other(format!("{provider} API request failed (status {status})"))
        }
    }
}
