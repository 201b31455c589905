use std::path::PathBuf;

use repolens_index::chunker::{ChunkPolicy, ChunkerConfig};
use repolens_index::indexer::IndexerConfig;
use serde::{Deserialize, Serialize};

use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub repos: ReposConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Chat model backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

impl LlmProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Ollama,
    OpenAi,
    #[default]
    Cohere,
}

fn default_embedding_base_url() -> String {
    repolens_llm::cohere::DEFAULT_BASE_URL.into()
}

fn default_embedding_model() -> String {
    repolens_llm::cohere::DEFAULT_EMBED_MODEL.into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankProviderKind {
    #[default]
    Cohere,
    None,
}

fn default_rerank_model() -> String {
    repolens_llm::cohere::DEFAULT_RERANK_MODEL.into()
}

fn default_top_n() -> usize {
    repolens_index::rerank::DEFAULT_TOP_N
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub provider: RerankProviderKind,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: RerankProviderKind::default(),
            base_url: default_embedding_base_url(),
            model: default_rerank_model(),
            top_n: default_top_n(),
        }
    }
}

fn default_index_root() -> PathBuf {
    PathBuf::from("vec_db")
}

fn default_concurrency() -> usize {
    4
}

fn default_batch_size() -> usize {
    50
}

fn default_text_policy() -> ChunkPolicy {
    ChunkPolicy::TEXT
}

fn default_code_policy() -> ChunkPolicy {
    ChunkPolicy::CODE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_root")]
    pub root: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extensions to index; empty means every extension the chunker knows.
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default = "default_text_policy")]
    pub text: ChunkPolicy,
    #[serde(default = "default_code_policy")]
    pub code: ChunkPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: default_index_root(),
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            extensions: Vec::new(),
            text: default_text_policy(),
            code: default_code_policy(),
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chunker: ChunkerConfig {
                text: self.text,
                code: self.code,
            },
            root: self.root.clone(),
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            extensions: self.extensions.clone(),
        }
    }
}

fn default_top_k() -> usize {
    repolens_index::retriever::DEFAULT_TOP_K
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("repo_infos.json")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReposConfig {
    #[serde(default = "default_registry_path")]
    pub registry: PathBuf,
}

impl Default for ReposConfig {
    fn default() -> Self {
        Self {
            registry: default_registry_path(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub cohere_api_key: Option<Secret>,
}
