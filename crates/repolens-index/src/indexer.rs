//! Vectorization run: walk -> chunk -> embed in bounded batches -> persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use repolens_llm::{EmbedMode, EmbeddingProvider, LlmError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::chunker::{ChunkerConfig, SourceChunk, chunk_source};
use crate::context::{contextualize_for_embedding, node_text};
use crate::error::{IndexError, Result};
use crate::languages::{detect_language, known_extensions};
use crate::snapshot::RepoSnapshot;
use crate::store::{ChunkMetadata, IndexedNode, VectorIndex};

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    /// Directory holding one index directory per repository.
    pub root: PathBuf,
    pub batch_size: usize,
    pub concurrency: usize,
    /// Lowercase extensions without the dot. Empty means every known extension.
    pub extensions: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            root: PathBuf::from("vec_db"),
            batch_size: 50,
            concurrency: 4,
            extensions: Vec::new(),
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub chunks_created: usize,
    /// Per-file failures (`path: reason`); those files are skipped.
    pub errors: Vec<String>,
    pub index_dir: PathBuf,
    pub duration_ms: u64,
}

struct PendingNode {
    id: uuid::Uuid,
    text: String,
    metadata: ChunkMetadata,
}

/// Builds and persists the vector index of a repository snapshot.
pub struct CodeIndexer<E> {
    embedder: Arc<E>,
    config: IndexerConfig,
}

impl<E: EmbeddingProvider + 'static> CodeIndexer<E> {
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero batch size or concurrency, or an
    /// invalid chunk policy.
    pub fn new(embedder: Arc<E>, config: IndexerConfig) -> Result<Self> {
        if config.batch_size == 0 || config.concurrency == 0 {
            return Err(IndexError::InvalidConfig(
                "batch_size and concurrency must be positive".into(),
            ));
        }
        config.chunker.text.validate()?;
        config.chunker.code.validate()?;
        Ok(Self { embedder, config })
    }

    #[must_use]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Index every eligible file of `snapshot`, replacing its previous index.
    ///
    /// Unreadable or unsupported files are reported and skipped. An embedding
    /// failure aborts the run and leaves any previous index untouched.
    ///
    /// # Errors
    ///
    /// Returns `Embedding` if the provider fails, or an IO/walk error.
    pub async fn build(&self, snapshot: &RepoSnapshot) -> Result<IndexReport> {
        let start = std::time::Instant::now();
        let mut report = IndexReport::default();

        let files = self.eligible_files(&snapshot.path)?;
        let total = files.len();
        tracing::info!(repo = %snapshot.id, total, "indexing started");

        let mut chunks: Vec<SourceChunk> = Vec::new();
        for (i, path) in files.iter().enumerate() {
            report.files_scanned += 1;
            let rel_path = path
                .strip_prefix(&snapshot.path)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            match self.chunk_file(snapshot, path, &rel_path).await {
                Ok(file_chunks) => {
                    if !file_chunks.is_empty() {
                        report.files_indexed += 1;
                    }
                    tracing::debug!(
                        file = %rel_path,
                        progress = format_args!("{}/{total}", i + 1),
                        chunks = file_chunks.len(),
                    );
                    chunks.extend(file_chunks);
                }
                Err(e) => {
                    tracing::warn!(file = %rel_path, "skipped: {e}");
                    report.errors.push(format!("{rel_path}: {e}"));
                }
            }
        }

        let pending: Vec<PendingNode> = chunks
            .iter()
            .map(|c| PendingNode {
                id: IndexedNode::node_id(&snapshot.id, &c.meta.rel_path, c.index),
                text: node_text(c),
                metadata: ChunkMetadata::from_chunk(c),
            })
            .collect();
        let inputs: Vec<String> = chunks.iter().map(contextualize_for_embedding).collect();
        drop(chunks);

        let vectors = self.embed_all(inputs).await?;
        let nodes = pending
            .into_iter()
            .zip(vectors)
            .map(|(p, embedding)| IndexedNode {
                id: p.id,
                text: p.text,
                metadata: p.metadata,
                embedding,
            })
            .collect::<Vec<_>>();
        report.chunks_created = nodes.len();

        let index = VectorIndex::new(snapshot.id.clone(), nodes)?;
        report.index_dir = index.persist(&self.config.root).await?;
        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            repo = %snapshot.id,
            files = report.files_indexed,
            chunks = report.chunks_created,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    fn eligible_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let allowed: Vec<String> = if self.config.extensions.is_empty() {
            known_extensions().into_iter().map(str::to_owned).collect()
        } else {
            self.config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect()
        };

        let mut files = Vec::new();
        for entry in ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .build()
        {
            let entry = entry?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)));
            if matches {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn chunk_file(
        &self,
        snapshot: &RepoSnapshot,
        path: &Path,
        rel_path: &str,
    ) -> Result<Vec<SourceChunk>> {
        let lang = detect_language(path)?;
        let bytes = tokio::fs::read(path).await?;
        let source = String::from_utf8(bytes).map_err(|e| {
            IndexError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        let meta = snapshot.file_meta(rel_path);
        chunk_source(&source, &meta, lang, &self.config.chunker)
    }

    /// Embed `inputs` in batches on a bounded worker set, preserving input order.
    async fn embed_all(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let total = inputs.len();
        let batches: Vec<Vec<String>> = inputs
            .chunks(self.config.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        let mut slots: Vec<Option<Vec<Vec<f32>>>> = vec![None; batches.len()];

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut set = JoinSet::new();
        for (idx, batch) in batches.into_iter().enumerate() {
            let embedder = Arc::clone(&self.embedder);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| IndexError::Worker(e.to_string()))?;
                let vectors = embedder.embed_batch(&batch, EmbedMode::Document).await?;
                if vectors.len() != batch.len() {
                    return Err(IndexError::Embedding(LlmError::Other(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    ))));
                }
                Ok::<_, IndexError>((idx, vectors))
            });
        }

        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| IndexError::Worker(e.to_string()));
            match outcome.and_then(|r| r) {
                Ok((idx, vectors)) => slots[idx] = Some(vectors),
                Err(e) => {
                    set.abort_all();
                    tracing::error!("embedding batch failed, aborting run: {e}");
                    return Err(e);
                }
            }
        }

        let mut out = Vec::with_capacity(total);
        for slot in slots {
            out.extend(slot.ok_or_else(|| IndexError::Worker("missing batch".into()))?);
        }
        Ok(out)
    }
}
