//! Test-only mock providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::LlmError;
use crate::provider::{EmbedMode, EmbeddingProvider, LlmProvider, Message, RerankHit, RerankProvider};

/// Chat mock replaying queued responses, then `default_response`.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub fail_chat: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            default_response: r#"{"answer":"mock response"}"#.into(),
            fail_chat: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    /// Every transcript the provider has been called with, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Deterministic bag-of-words embedder: identical vocabulary gives identical vectors.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dims: usize,
    pub fail: bool,
    /// Fail on the n-th call (1-based) and every call after it.
    pub fail_after: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dims: 64,
            fail: false,
            fail_after: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims.max(1)];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let bucket = fnv1a(token.as_bytes()) % v.len() as u64;
            #[allow(clippy::cast_possible_truncation)]
            {
                v[bucket as usize] += 1.0;
            }
        }
        v
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail || self.fail_after.is_some_and(|limit| n >= limit) {
            return Err(LlmError::Unauthorized { provider: "mock" });
        }
        Ok(self.vector_for(text))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Reranker scoring documents by shared lowercase words with the query.
#[derive(Debug, Clone, Default)]
pub struct MockReranker {
    pub fail: bool,
    /// Rank the last document first, then return an index outside the documents.
    pub out_of_range: bool,
}

impl MockReranker {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            out_of_range: false,
        }
    }
}

impl RerankProvider for MockReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, LlmError> {
        if self.fail {
            return Err(LlmError::RateLimited);
        }
        if self.out_of_range {
            return Ok(vec![
                RerankHit {
                    index: documents.len().saturating_sub(1),
                    relevance: 2.0,
                },
                RerankHit {
                    index: documents.len() + 7,
                    relevance: 1.0,
                },
            ]);
        }
        let words = |s: &str| -> std::collections::HashSet<String> {
            s.split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase)
                .collect()
        };
        let q = words(query);
        let mut hits: Vec<RerankHit> = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| {
                #[allow(clippy::cast_precision_loss)]
                let relevance = words(doc).intersection(&q).count() as f32;
                RerankHit { index, relevance }
            })
            .collect();
        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then(a.index.cmp(&b.index)));
        hits.truncate(top_n);
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
