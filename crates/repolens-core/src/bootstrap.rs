//! Application bootstrap: config resolution, provider construction and
//! wiring of the indexer and conversation sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use repolens_index::indexer::CodeIndexer;
use repolens_index::rerank::Reranker;
use repolens_llm::any::{AnyEmbedder, AnyProvider, AnyReranker};
use repolens_llm::cohere::CohereClient;
use repolens_llm::ollama::OllamaProvider;
use repolens_llm::openai::OpenAiProvider;

use crate::config::{
    COHERE_API_KEY, Config, EmbeddingProviderKind, LlmProviderKind, OPENAI_API_KEY,
    RerankProviderKind,
};
use crate::error::{ChatError, Result};
use crate::orchestrator::{ConversationSession, Orchestrator};
use crate::rag::IndexSession;
use crate::registry::RepoRegistry;
use crate::vault::{EnvVaultProvider, Secret, VaultProvider};

pub const CONFIG_ENV: &str = "REPOLENS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/repolens.toml";

/// Retrieval over the configured embedding and rerank backends.
pub type RepoSession = ConversationSession<IndexSession<AnyEmbedder, AnyReranker>>;

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
}

impl AppBuilder {
    /// Load config from `config_path`, validate it and resolve secrets from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed or is out of range.
    pub async fn from_env(config_path: PathBuf) -> anyhow::Result<Self> {
        Self::with_vault(config_path, &EnvVaultProvider).await
    }

    /// # Errors
    ///
    /// Returns an error if the config is invalid or the vault fails.
    pub async fn with_vault(config_path: PathBuf, vault: &dyn VaultProvider) -> anyhow::Result<Self> {
        let mut config = Config::load(&config_path)?;
        config.validate()?;
        config.resolve_secrets(vault).await?;
        tracing::debug!(
            path = %config_path.display(),
            llm = %config.llm.provider,
            "configuration loaded"
        );
        Ok(Self {
            config,
            config_path,
        })
    }

    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub fn registry(&self) -> RepoRegistry {
        RepoRegistry::new(&self.config.repos.registry)
    }

    /// # Errors
    ///
    /// Returns `MissingCredential` if the embedding backend needs an absent key.
    pub fn build_indexer(&self) -> anyhow::Result<CodeIndexer<AnyEmbedder>> {
        let embedder = Arc::new(create_embedder(&self.config)?);
        Ok(CodeIndexer::new(embedder, self.config.index.indexer_config())?)
    }

    /// # Errors
    ///
    /// Returns `MissingCredential` if the chat backend needs an absent key.
    pub async fn build_orchestrator(&self) -> Result<Orchestrator<AnyProvider>> {
        let provider = create_provider(&self.config)?;
        health_check(&provider).await;
        Ok(Orchestrator::new(provider))
    }

    /// Open a conversation about the registered repository `repo_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepoNotFound` for an unregistered id, `Retrieval` with
    /// `IndexNotFound` if it was never indexed, or `MissingCredential`.
    pub async fn open_session(&self, repo_id: &str) -> Result<RepoSession> {
        let snapshot = self.registry().get(repo_id)?;
        let embedder = Arc::new(create_embedder(&self.config)?);
        let reranker = Reranker::new(create_reranker(&self.config)?);
        let retrieval = IndexSession::load(
            embedder,
            reranker,
            &self.config.index.root,
            &snapshot.id,
            self.config.retrieval.top_k,
            self.config.rerank.top_n,
        )
        .await?;
        tracing::info!(repo = %snapshot.id, "conversation session opened");
        Ok(ConversationSession::new(&snapshot, retrieval))
    }
}

/// Priority: `--config` argument > `REPOLENS_CONFIG` env > `config/repolens.toml`.
#[must_use]
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn require(secret: Option<&Secret>, key: &str) -> Result<String> {
    secret
        .map(|s| s.expose().to_owned())
        .ok_or_else(|| ChatError::MissingCredential { key: key.to_owned() })
}

/// # Errors
///
/// Returns `MissingCredential` when OpenAI is selected without an API key.
pub fn create_provider(config: &Config) -> Result<AnyProvider> {
    let llm = &config.llm;
    match llm.provider {
        LlmProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            config.embedding.model.clone(),
        ))),
        LlmProviderKind::OpenAi => {
            let api_key = require(config.secrets.openai_api_key.as_ref(), OPENAI_API_KEY)?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                api_key,
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                None,
            )))
        }
    }
}

/// # Errors
///
/// Returns `MissingCredential` when a remote backend is selected without an API key.
pub fn create_embedder(config: &Config) -> Result<AnyEmbedder> {
    let emb = &config.embedding;
    match emb.provider {
        EmbeddingProviderKind::Ollama => Ok(AnyEmbedder::Ollama(OllamaProvider::new(
            &emb.base_url,
            emb.model.clone(),
            emb.model.clone(),
        ))),
        EmbeddingProviderKind::OpenAi => {
            let api_key = require(config.secrets.openai_api_key.as_ref(), OPENAI_API_KEY)?;
            Ok(AnyEmbedder::OpenAi(OpenAiProvider::new(
                api_key,
                emb.base_url.clone(),
                config.llm.model.clone(),
                config.llm.max_tokens,
                Some(emb.model.clone()),
            )))
        }
        EmbeddingProviderKind::Cohere => {
            let api_key = require(config.secrets.cohere_api_key.as_ref(), COHERE_API_KEY)?;
            Ok(AnyEmbedder::Cohere(
                CohereClient::new(api_key, emb.base_url.clone()).with_embed_model(emb.model.clone()),
            ))
        }
    }
}

/// # Errors
///
/// Returns `MissingCredential` when Cohere is selected without an API key.
pub fn create_reranker(config: &Config) -> Result<AnyReranker> {
    let rr = &config.rerank;
    match rr.provider {
        RerankProviderKind::None => Ok(AnyReranker::Passthrough),
        RerankProviderKind::Cohere => {
            let api_key = require(config.secrets.cohere_api_key.as_ref(), COHERE_API_KEY)?;
            Ok(AnyReranker::Cohere(
                CohereClient::new(api_key, rr.base_url.clone()).with_rerank_model(rr.model.clone()),
            ))
        }
    }
}

pub async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}
