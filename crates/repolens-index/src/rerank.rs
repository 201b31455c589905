//! Second-stage relevance ordering with similarity fallback.

use repolens_llm::RerankProvider;

use crate::store::Candidate;

pub const DEFAULT_TOP_N: usize = 2;

/// Reorders retrieved candidates with a rerank provider and keeps the best
/// `top_n`, replacing each kept score with the provider's relevance.
/// Never fails: provider errors fall back to similarity order and scores.
pub struct Reranker<R> {
    provider: Option<R>,
}

impl<R: RerankProvider> Reranker<R> {
    #[must_use]
    pub fn new(provider: R) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Reranker that always keeps the similarity top-N.
    #[must_use]
    pub fn passthrough() -> Self {
        Self { provider: None }
    }

    pub async fn rerank(&self, query: &str, candidates: Vec<Candidate>, top_n: usize) -> Vec<Candidate> {
        let Some(provider) = &self.provider else {
            return similarity_top(candidates, top_n);
        };
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let documents: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let hits = match provider.rerank(query, &documents, top_n).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    "rerank failed, keeping similarity order: {e}"
                );
                return similarity_top(candidates, top_n);
            }
        };

        let total = hits.len();
        let valid: Vec<_> = hits
            .into_iter()
            .filter(|h| h.index < candidates.len())
            .collect();
        let dropped = total - valid.len();
        if dropped > 0 {
            tracing::warn!(
                provider = provider.name(),
                dropped,
                valid = valid.len(),
                candidates = candidates.len(),
                "rerank returned out-of-range indices, filling with similarity order"
            );
        }

        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut reranked: Vec<Candidate> = valid
            .iter()
            .filter_map(|h| {
                slots[h.index].take().map(|mut c| {
                    c.score = h.relevance;
                    c
                })
            })
            .take(top_n)
            .collect();
        // Leftovers keep their similarity score.
        if dropped > 0 && reranked.len() < top_n {
            let missing = top_n - reranked.len();
            reranked.extend(slots.into_iter().flatten().take(missing));
        }
        tracing::debug!(provider = provider.name(), kept = reranked.len(), "reranked");
        reranked
    }
}

fn similarity_top(mut candidates: Vec<Candidate>, top_n: usize) -> Vec<Candidate> {
    candidates.truncate(top_n);
    candidates
}
