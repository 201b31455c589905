//! Cohere embed and rerank endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result, require_key, status_error};
use crate::http::{default_client, trim_base_url};
use crate::provider::{EmbedMode, EmbeddingProvider, RerankHit, RerankProvider};
use crate::retry::send_with_retry;

const PROVIDER: &str = "cohere";
const MAX_RETRIES: u32 = 3;
/// Upper bound on texts per embed request accepted by the API.
const MAX_EMBED_TEXTS: usize = 96;

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com/v1";
pub const DEFAULT_EMBED_MODEL: &str = "embed-english-v3.0";
pub const DEFAULT_RERANK_MODEL: &str = "rerank-english-v3.0";

#[derive(Clone)]
pub struct CohereClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embed_model: String,
    rerank_model: String,
}

impl fmt::Debug for CohereClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embed_model", &self.embed_model)
            .field("rerank_model", &self.rerank_model)
            .finish_non_exhaustive()
    }
}

impl CohereClient {
    #[must_use]
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: default_client(),
            api_key,
            base_url: trim_base_url(base_url),
            embed_model: DEFAULT_EMBED_MODEL.into(),
            rerank_model: DEFAULT_RERANK_MODEL.into(),
        }
    }

    #[must_use]
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    #[must_use]
    pub fn with_rerank_model(mut self, model: impl Into<String>) -> Self {
        self.rerank_model = model.into();
        self
    }

    async fn post<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        require_key(PROVIDER, &self.api_key)?;
        let url = format!("{}/{path}", self.base_url);
        let response = send_with_retry(PROVIDER, MAX_RETRIES, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;
        if !status.is_success() {
            return Err(status_error(PROVIDER, status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl EmbeddingProvider for CohereClient {
    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_owned()], mode).await?;
        batch
            .pop()
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed_batch(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for window in texts.chunks(MAX_EMBED_TEXTS) {
            let body = EmbedRequest {
                texts: window,
                model: &self.embed_model,
                input_type: mode.as_str(),
                embedding_types: &["float"],
            };
            let resp: EmbedResponse = self.post("embed", &body).await?;
            if resp.embeddings.float.len() != window.len() {
                return Err(LlmError::EmptyResponse { provider: PROVIDER });
            }
            out.extend(resp.embeddings.float);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

impl RerankProvider for CohereClient {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        let body = RerankRequest {
            model: &self.rerank_model,
            query,
            documents,
            top_n: top_n.min(documents.len()),
        };
        let resp: RerankResponse = self.post("rerank", &body).await?;
        tracing::debug!(hits = resp.results.len(), "cohere rerank done");
        Ok(resp
            .results
            .into_iter()
            .map(|r| RerankHit {
                index: r.index,
                relevance: r.relevance_score,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: &'a str,
    embedding_types: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: FloatEmbeddings,
}

#[derive(Deserialize)]
struct FloatEmbeddings {
    float: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}
