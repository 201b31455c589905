//! Repository ingestion and retrieval.
//!
//! Files are split into overlapping, language-aware chunks, embedded through
//! an injected [`repolens_llm::EmbeddingProvider`] and persisted as one vector
//! index directory per repository. At query time the index is loaded, searched
//! by cosine similarity and the candidates are reranked down to a handful.

pub mod chunker;
pub(crate) mod context;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod rerank;
pub mod retriever;
pub mod snapshot;
pub(crate) mod splitter;
pub mod store;
pub mod structure;

pub use error::{IndexError, Result};
pub use snapshot::RepoSnapshot;
