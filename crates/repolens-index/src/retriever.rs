//! Query-time similarity search over a loaded vector index.

use std::path::Path;
use std::sync::Arc;

use repolens_llm::{EmbedMode, EmbeddingProvider};

use crate::error::{IndexError, Result};
use crate::store::{Candidate, VectorIndex};

pub const DEFAULT_TOP_K: usize = 15;

pub struct Retriever<E> {
    embedder: Arc<E>,
    index: VectorIndex,
}

impl<E: EmbeddingProvider> Retriever<E> {
    #[must_use]
    pub fn new(embedder: Arc<E>, index: VectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Load the persisted index of `repo_id` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` if the repository was never vectorized.
    pub async fn load(embedder: Arc<E>, root: &Path, repo_id: &str) -> Result<Self> {
        let index = VectorIndex::load(root, repo_id).await?;
        Ok(Self::new(embedder, index))
    }

    #[must_use]
    pub fn repo_id(&self) -> &str {
        &self.index.repo_id
    }

    /// The `k` most similar chunks to `query`.
    ///
    /// # Errors
    ///
    /// Returns `RetrievalEmpty` for an index without nodes, `Embedding` if the
    /// query cannot be embedded, or `DimensionMismatch` if the query vector
    /// does not match the index.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        if self.index.is_empty() {
            return Err(IndexError::RetrievalEmpty {
                repo_id: self.index.repo_id.clone(),
            });
        }
        let vector = self.embedder.embed(query, EmbedMode::Query).await?;
        let hits = self.index.search(&vector, k)?;
        tracing::debug!(
            repo = %self.index.repo_id,
            k,
            hits = hits.len(),
            top_score = hits.first().map_or(0.0, |c| c.score),
            "retrieved candidates"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use repolens_llm::mock::MockEmbedder;

    use super::*;
    use crate::store::{ChunkMetadata, IndexedNode};

    fn node(embedder: &MockEmbedder, path: &str, text: &str) -> IndexedNode {
        IndexedNode {
            id: IndexedNode::node_id("acme/widgets", path, 0),
            text: text.into(),
            metadata: ChunkMetadata {
                source: path.into(),
                source_url: String::new(),
                source_last_updated: String::new(),
                path: path.into(),
                language: "text".into(),
                lines: (1, 1),
            },
            embedding: embedder.vector_for(text),
        }
    }

    fn retriever(texts: &[(&str, &str)]) -> Retriever<MockEmbedder> {
        let embedder = MockEmbedder::default();
        let nodes = texts.iter().map(|(p, t)| node(&embedder, p, t)).collect();
        Retriever::new(
            Arc::new(embedder),
            VectorIndex::new("acme/widgets", nodes).unwrap(),
        )
    }

    #[tokio::test]
    async fn most_similar_chunk_ranks_first() {
        let r = retriever(&[
            ("net.c", "socket connect retry backoff"),
            ("ui.c", "button render color theme"),
            ("db.c", "sql query transaction commit"),
        ]);
        let hits = r.retrieve("how does the socket connect retry", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.source, "net.c");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn k_larger_than_index_returns_all() {
        let r = retriever(&[("a", "alpha"), ("b", "beta")]);
        assert_eq!(r.retrieve("alpha", DEFAULT_TOP_K).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_index_is_retrieval_empty() {
        let embedder = Arc::new(MockEmbedder::default());
        let r = Retriever::new(
            Arc::clone(&embedder),
            VectorIndex::new("acme/empty", Vec::new()).unwrap(),
        );
        assert!(matches!(
            r.retrieve("anything", 15).await,
            Err(IndexError::RetrievalEmpty { repo_id }) if repo_id == "acme/empty"
        ));
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_index_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let res = Retriever::load(Arc::new(MockEmbedder::default()), tmp.path(), "acme/none").await;
        assert!(matches!(res, Err(IndexError::IndexNotFound { .. })));
    }

    #[tokio::test]
    async fn query_embedding_failure_surfaces() {
        let embedder = MockEmbedder::default();
        let nodes = vec![node(&embedder, "a", "alpha")];
        let r = Retriever::new(
            Arc::new(MockEmbedder::failing()),
            VectorIndex::new("acme/widgets", nodes).unwrap(),
        );
        assert!(matches!(r.retrieve("alpha", 5).await, Err(IndexError::Embedding(_))));
    }
}
