//! Runtime-selected backends behind one concrete type each.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::cohere::CohereClient;
use crate::error::Result;
#[cfg(feature = "mock")]
use crate::mock::{MockEmbedder, MockProvider, MockReranker};
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{
    EmbedMode, EmbeddingProvider, LlmProvider, Message, RerankHit, RerankProvider,
};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Ollama($p) => $expr,
            AnyProvider::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Ollama($p) => $expr,
            AnyEmbedder::OpenAi($p) => $expr,
            AnyEmbedder::Cohere($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    async fn chat_typed<T>(&self, messages: &[Message]) -> Result<T>
    where
        T: DeserializeOwned + JsonSchema + Send,
        Self: Sized,
    {
        delegate_provider!(self, |p| p.chat_typed::<T>(messages).await)
    }

    fn name(&self) -> &'static str {
        delegate_provider!(self, |p| LlmProvider::name(p))
    }
}

/// Embedding backend: local model (Ollama) or remote API (OpenAI, Cohere).
#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    Cohere(CohereClient),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

impl AnyEmbedder {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama(_))
    }
}

impl EmbeddingProvider for AnyEmbedder {
    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        delegate_embedder!(self, |p| p.embed(text, mode).await)
    }

    async fn embed_batch(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        delegate_embedder!(self, |p| p.embed_batch(texts, mode).await)
    }

    fn name(&self) -> &'static str {
        delegate_embedder!(self, |p| EmbeddingProvider::name(p))
    }
}

/// Rerank backend. `Passthrough` keeps the incoming order and never fails.
#[derive(Debug, Clone)]
pub enum AnyReranker {
    Cohere(CohereClient),
    Passthrough,
    #[cfg(feature = "mock")]
    Mock(MockReranker),
}

impl RerankProvider for AnyReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>> {
        match self {
            Self::Cohere(p) => p.rerank(query, documents, top_n).await,
            Self::Passthrough => Ok((0..documents.len().min(top_n))
                .map(|index| RerankHit {
                    index,
                    relevance: 0.0,
                })
                .collect()),
            #[cfg(feature = "mock")]
            Self::Mock(p) => p.rerank(query, documents, top_n).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Cohere(p) => RerankProvider::name(p),
            Self::Passthrough => "passthrough",
            #[cfg(feature = "mock")]
            Self::Mock(p) => RerankProvider::name(p),
        }
    }
}
