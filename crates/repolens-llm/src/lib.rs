//! Chat, embedding and rerank provider abstraction and backend implementations.

pub mod any;
pub mod cohere;
pub mod error;
pub(crate) mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use provider::{EmbedMode, EmbeddingProvider, LlmProvider, RerankHit, RerankProvider};
