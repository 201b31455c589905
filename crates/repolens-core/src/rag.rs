//! Retrieval for the conversation: retrieve, rerank, and never hand the model
//! the same chunk twice in one conversation.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use repolens_index::IndexError;
use repolens_index::rerank::Reranker;
use repolens_index::retriever::Retriever;
use repolens_index::store::Candidate;
use repolens_llm::{EmbeddingProvider, RerankProvider};
use serde_json::json;
use uuid::Uuid;

/// Chars of the user query echoed in the context header.
const QUERY_ECHO_CHARS: usize = 100;

/// Appended when every retrieved chunk was already given to the model.
pub const ALL_SEEN: &str = " - All retrieved documents are already in the chat history.";

/// Appended when the index has nothing to retrieve.
pub const NO_RESULTS: &str = " - No matching documents were found in the repository index.";

/// A source of reranked candidates for a query.
pub trait RetrievalSession: Send + Sync {
    fn retrieve(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Candidate>, IndexError>> + Send;
}

/// Similarity search followed by reranking.
pub struct IndexSession<E, R> {
    retriever: Retriever<E>,
    reranker: Reranker<R>,
    top_k: usize,
    top_n: usize,
}

impl<E, R> IndexSession<E, R>
where
    E: EmbeddingProvider,
    R: RerankProvider,
{
    #[must_use]
    pub fn new(retriever: Retriever<E>, reranker: Reranker<R>, top_k: usize, top_n: usize) -> Self {
        Self {
            retriever,
            reranker,
            top_k,
            top_n,
        }
    }

    /// Load the persisted index of `repo_id` and build a session over it.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` if the repository was never vectorized.
    pub async fn load(
        embedder: Arc<E>,
        reranker: Reranker<R>,
        root: &std::path::Path,
        repo_id: &str,
        top_k: usize,
        top_n: usize,
    ) -> Result<Self, IndexError> {
        let retriever = Retriever::load(embedder, root, repo_id).await?;
        Ok(Self::new(retriever, reranker, top_k, top_n))
    }
}

impl<E, R> RetrievalSession for IndexSession<E, R>
where
    E: EmbeddingProvider + Send + Sync,
    R: RerankProvider + Send + Sync,
{
    async fn retrieve(&self, query: &str) -> Result<Vec<Candidate>, IndexError> {
        let candidates = self.retriever.retrieve(query, self.top_k).await?;
        Ok(self.reranker.rerank(query, candidates, self.top_n).await)
    }
}

/// Node ids already handed to the model in this conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenNodes(HashSet<Uuid>);

impl SeenNodes {
    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.0.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, id: Uuid) -> bool {
        self.0.insert(id)
    }
}

/// Wraps a retrieval session and filters out chunks the model has already seen.
pub struct DeduplicatingSession<S> {
    inner: S,
    seen: SeenNodes,
}

impl<S: RetrievalSession> DeduplicatingSession<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            seen: SeenNodes::default(),
        }
    }

    #[must_use]
    pub fn seen(&self) -> &SeenNodes {
        &self.seen
    }

    #[must_use]
    pub fn checkpoint(&self) -> SeenNodes {
        self.seen.clone()
    }

    pub fn restore(&mut self, checkpoint: SeenNodes) {
        self.seen = checkpoint;
    }

    pub fn reset(&mut self) {
        self.seen = SeenNodes::default();
    }

    /// Retrieve context for `text` as a numbered block of unseen chunks.
    ///
    /// Never returns an empty string: all-seen and nothing-indexed results
    /// end in [`ALL_SEEN`] and [`NO_RESULTS`].
    ///
    /// # Errors
    ///
    /// Propagates retrieval errors other than an empty index.
    pub async fn query(&mut self, text: &str) -> Result<String, IndexError> {
        let mut out = context_header(text);
        let candidates = match self.inner.retrieve(text).await {
            Ok(c) => c,
            Err(IndexError::RetrievalEmpty { repo_id }) => {
                tracing::debug!(repo = %repo_id, "index is empty");
                out.push_str(NO_RESULTS);
                return Ok(out);
            }
            Err(e) => return Err(e),
        };
        if candidates.is_empty() {
            out.push_str(NO_RESULTS);
            return Ok(out);
        }

        let mut fresh = 0usize;
        for candidate in &candidates {
            if !self.seen.insert(candidate.id) {
                continue;
            }
            fresh += 1;
            let doc = json!({
                "metadata": candidate.metadata,
                "context": candidate.text,
            });
            let _ = writeln!(out, "{fresh}. {doc}");
        }
        tracing::debug!(
            retrieved = candidates.len(),
            fresh,
            seen_total = self.seen.len(),
            "rag query"
        );
        if fresh == 0 {
            out.push_str(ALL_SEEN);
        }
        Ok(out)
    }
}

fn context_header(query: &str) -> String {
    let echo: String = query.chars().take(QUERY_ECHO_CHARS).collect();
    format!("Use this as code context that may answer the user query: {echo}...\n")
}
