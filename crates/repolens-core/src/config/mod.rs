mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

pub const OPENAI_API_KEY: &str = "REPOLENS_OPENAI_API_KEY";
pub const COHERE_API_KEY: &str = "REPOLENS_COHERE_API_KEY";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error naming the first out-of-range setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.concurrency == 0 {
            bail!("index.concurrency must be at least 1");
        }
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be at least 1");
        }
        for (name, policy) in [("index.text", self.index.text), ("index.code", self.index.code)] {
            policy
                .validate()
                .with_context(|| format!("{name} chunk policy is invalid"))?;
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if self.rerank.top_n == 0 {
            bail!("rerank.top_n must be at least 1");
        }
        if self.rerank.top_n > self.retrieval.top_k {
            bail!(
                "rerank.top_n ({}) cannot exceed retrieval.top_k ({})",
                self.rerank.top_n,
                self.retrieval.top_k
            );
        }
        Ok(())
    }

    /// Vault keys the configured remote providers need.
    #[must_use]
    pub fn required_secrets(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.llm.provider == LlmProviderKind::OpenAi
            || self.embedding.provider == EmbeddingProviderKind::OpenAi
        {
            keys.push(OPENAI_API_KEY);
        }
        if self.embedding.provider == EmbeddingProviderKind::Cohere
            || self.rerank.provider == RerankProviderKind::Cohere
        {
            keys.push(COHERE_API_KEY);
        }
        keys
    }

    /// Resolve API keys through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret(OPENAI_API_KEY).await? {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret(COHERE_API_KEY).await? {
            self.secrets.cohere_api_key = Some(Secret::new(val));
        }
        Ok(())
    }
}
