use super::Config;

fn parse_kind<T: serde::de::DeserializeOwned>(var: &str, value: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(value.to_owned())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {var} value: {value}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_providers();
        self.apply_env_overrides_index();
    }

    fn apply_env_overrides_providers(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_LLM_PROVIDER")
            && let Some(kind) = parse_kind("REPOLENS_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_EMBEDDING_PROVIDER")
            && let Some(kind) = parse_kind("REPOLENS_EMBEDDING_PROVIDER", &v)
        {
            self.embedding.provider = kind;
        }
        if let Ok(v) = std::env::var("REPOLENS_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_RERANK_PROVIDER")
            && let Some(kind) = parse_kind("REPOLENS_RERANK_PROVIDER", &v)
        {
            self.rerank.provider = kind;
        }
        if let Ok(v) = std::env::var("REPOLENS_RERANK_TOP_N")
            && let Ok(n) = v.parse::<usize>()
        {
            self.rerank.top_n = n;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_INDEX_ROOT") {
            self.index.root = v.into();
        }
        if let Ok(v) = std::env::var("REPOLENS_INDEX_CONCURRENCY")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.concurrency = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_INDEX_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.batch_size = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_INDEX_EXTENSIONS") {
            self.index.extensions = v
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("REPOLENS_RETRIEVAL_TOP_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("REPOLENS_REPOS_REGISTRY") {
            self.repos.registry = v.into();
        }
    }
}
