//! Persisted per-repository vector index with brute-force cosine search.
//!
//! Layout: `<root>/<repo_id>/index.json`. A rebuild is written to a staging
//! directory next to the final one. The live directory is renamed aside to
//! `<repo_id>.previous` before the staging one takes its place, and is only
//! deleted afterwards. A reader that lands between the two renames falls back
//! to the previous index.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunker::SourceChunk;
use crate::error::{IndexError, Result};

const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

/// Metadata carried by every node and returned with every candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Owning file name.
    pub source: String,
    pub source_url: String,
    pub source_last_updated: String,
    pub path: String,
    pub language: String,
    pub lines: (usize, usize),
}

impl ChunkMetadata {
    #[must_use]
    pub fn from_chunk(chunk: &SourceChunk) -> Self {
        Self {
            source: chunk.meta.file_name.clone(),
            source_url: chunk.meta.url.clone(),
            source_last_updated: chunk.meta.last_updated.clone(),
            path: chunk.meta.rel_path.clone(),
            language: chunk.language.id().to_owned(),
            lines: chunk.line_range,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedNode {
    pub id: Uuid,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

impl IndexedNode {
    /// Deterministic id for chunk `index` of `rel_path`, stable across rebuilds.
    #[must_use]
    pub fn node_id(repo_id: &str, rel_path: &str, index: usize) -> Uuid {
        Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("{repo_id}:{rel_path}:{index}").as_bytes(),
        )
    }
}

/// A node returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: Uuid,
    pub metadata: ChunkMetadata,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub version: u32,
    pub repo_id: String,
    /// Embedding length; zero for an index without nodes.
    pub dims: usize,
    pub nodes: Vec<IndexedNode>,
}

impl VectorIndex {
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the nodes disagree on embedding length.
    pub fn new(repo_id: impl Into<String>, nodes: Vec<IndexedNode>) -> Result<Self> {
        let dims = nodes.first().map_or(0, |n| n.embedding.len());
        if let Some(bad) = nodes.iter().find(|n| n.embedding.len() != dims) {
            return Err(IndexError::DimensionMismatch {
                expected: dims,
                actual: bad.embedding.len(),
            });
        }
        Ok(Self {
            version: FORMAT_VERSION,
            repo_id: repo_id.into(),
            dims,
            nodes,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether an index has been persisted for `repo_id`.
    #[must_use]
    pub fn exists(root: &Path, repo_id: &str) -> bool {
        index_dir(root, repo_id).is_ok_and(|dir| {
            dir.join(INDEX_FILE).is_file() || previous_dir(&dir).join(INDEX_FILE).is_file()
        })
    }

    /// Load the persisted index of `repo_id`.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` when nothing was persisted, `FormatVersion` for
    /// an index from an incompatible release, or an IO/JSON error.
    pub async fn load(root: &Path, repo_id: &str) -> Result<Self> {
        let dir = index_dir(root, repo_id)?;
        let bytes = match read_index_file(&dir).await? {
            Some(b) => b,
            None => match read_index_file(&previous_dir(&dir)).await? {
                Some(b) => {
                    tracing::warn!(repo = repo_id, "index swap interrupted, loading previous index");
                    b
                }
                None => {
                    return Err(IndexError::IndexNotFound {
                        repo_id: repo_id.to_owned(),
                    });
                }
            },
        };
        let index: Self = serde_json::from_slice(&bytes)?;
        if index.version != FORMAT_VERSION {
            return Err(IndexError::FormatVersion(index.version));
        }
        tracing::debug!(repo = repo_id, nodes = index.len(), "vector index loaded");
        Ok(index)
    }

    /// Write the index under `root`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an IO or JSON error. The previous index stays loadable if
    /// either the staging write or the swap fails.
    pub async fn persist(&self, root: &Path) -> Result<PathBuf> {
        let dir = index_dir(root, &self.repo_id)?;
        let staging = staging_dir(&dir);
        let previous = previous_dir(&dir);
        remove_if_exists(&staging).await?;
        tokio::fs::create_dir_all(&staging).await?;
        let bytes = serde_json::to_vec(self)?;
        tokio::fs::write(staging.join(INDEX_FILE), bytes).await?;

        let had_live = tokio::fs::try_exists(&dir).await?;
        if had_live {
            remove_if_exists(&previous).await?;
            tokio::fs::rename(&dir, &previous).await?;
        }
        if let Err(e) = tokio::fs::rename(&staging, &dir).await {
            if had_live && let Err(restore) = tokio::fs::rename(&previous, &dir).await {
                tracing::error!(repo = %self.repo_id, "failed to restore previous index: {restore}");
            }
            return Err(e.into());
        }
        remove_if_exists(&previous).await?;
        tracing::info!(repo = %self.repo_id, nodes = self.len(), path = %dir.display(), "vector index persisted");
        Ok(dir)
    }

    /// Delete the persisted index of `repo_id`. Missing indexes are not an error.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory exists but cannot be removed.
    pub async fn remove(root: &Path, repo_id: &str) -> Result<bool> {
        let dir = index_dir(root, repo_id)?;
        remove_if_exists(&staging_dir(&dir)).await?;
        remove_if_exists(&previous_dir(&dir)).await?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Top `k` nodes by cosine similarity, descending; ties by ascending node id.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `query` has a different length than the stored vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>> {
        if !self.is_empty() && query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }
        let mut scored: Vec<(f32, &IndexedNode)> = self
            .nodes
            .iter()
            .map(|n| (cosine_similarity(query, &n.embedding), n))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, n)| Candidate {
                id: n.id,
                metadata: n.metadata.clone(),
                text: n.text.clone(),
                score,
            })
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Directory of `repo_id` under `root`. Ids are `owner/name`, so only plain
/// relative components are accepted.
fn index_dir(root: &Path, repo_id: &str) -> Result<PathBuf> {
    let rel = Path::new(repo_id);
    let plain = rel.components().all(|c| matches!(c, Component::Normal(_)));
    if repo_id.is_empty() || !plain {
        return Err(IndexError::InvalidConfig(format!(
            "invalid repository id: {repo_id:?}"
        )));
    }
    Ok(root.join(rel))
}

fn staging_dir(dir: &Path) -> PathBuf {
    sibling(dir, ".staging")
}

fn previous_dir(dir: &Path) -> PathBuf {
    sibling(dir, ".previous")
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(suffix);
    dir.with_file_name(name)
}

async fn read_index_file(dir: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(dir.join(INDEX_FILE)).await {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(source: &str) -> ChunkMetadata {
        ChunkMetadata {
            source: source.into(),
            source_url: format!("https://github.com/acme/widgets/blob/abc/{source}"),
            source_last_updated: "2024-05-01 10:00:00".into(),
            path: source.into(),
            language: "cpp".into(),
            lines: (1, 10),
        }
    }

    fn node(repo: &str, path: &str, index: usize, embedding: Vec<f32>) -> IndexedNode {
        IndexedNode {
            id: IndexedNode::node_id(repo, path, index),
            text: format!("// file name: {path}\nchunk {index}"),
            metadata: meta(path),
            embedding,
        }
    }

    #[test]
    fn node_ids_are_deterministic() {
        assert_eq!(
            IndexedNode::node_id("a/b", "main.cpp", 0),
            IndexedNode::node_id("a/b", "main.cpp", 0)
        );
        assert_ne!(
            IndexedNode::node_id("a/b", "main.cpp", 0),
            IndexedNode::node_id("a/b", "main.cpp", 1)
        );
    }

    #[test]
    fn search_orders_by_score_then_id() {
        let index = VectorIndex::new(
            "acme/widgets",
            vec![
                node("acme/widgets", "a.cpp", 0, vec![1.0, 0.0]),
                node("acme/widgets", "b.cpp", 0, vec![0.0, 1.0]),
                node("acme/widgets", "c.cpp", 0, vec![0.0, 2.0]),
                node("acme/widgets", "d.cpp", 0, vec![0.7, 0.7]),
            ],
        )
        .unwrap();
        let hits = index.search(&[0.0, 1.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 1.0).abs() < 1e-6);
        assert!(hits[0].id < hits[1].id);
        assert_eq!(hits[2].metadata.source, "d.cpp");
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let index =
            VectorIndex::new("a/b", vec![node("a/b", "x.rs", 0, vec![1.0, 0.0, 0.0])]).unwrap();
        assert!(matches!(
            index.search(&[1.0], 5),
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn new_rejects_mixed_dimensions() {
        let res = VectorIndex::new(
            "a/b",
            vec![node("a/b", "x", 0, vec![1.0]), node("a/b", "y", 0, vec![1.0, 2.0])],
        );
        assert!(matches!(res, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn index_dir_rejects_traversal() {
        let root = Path::new("/tmp/idx");
        assert!(index_dir(root, "../etc").is_err());
        assert!(index_dir(root, "/abs").is_err());
        assert!(index_dir(root, "").is_err());
        assert_eq!(
            index_dir(root, "acme/widgets").unwrap(),
            PathBuf::from("/tmp/idx/acme/widgets")
        );
    }

    #[tokio::test]
    async fn persist_load_replace_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let first = VectorIndex::new("acme/widgets", vec![node("acme/widgets", "a", 0, vec![1.0])])
            .unwrap();
        first.persist(tmp.path()).await.unwrap();
        assert!(VectorIndex::exists(tmp.path(), "acme/widgets"));

        let second = VectorIndex::new(
            "acme/widgets",
            vec![
                node("acme/widgets", "a", 0, vec![1.0]),
                node("acme/widgets", "b", 0, vec![0.5]),
            ],
        )
        .unwrap();
        second.persist(tmp.path()).await.unwrap();

        let loaded = VectorIndex::load(tmp.path(), "acme/widgets").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dims, 1);
        assert!(!tmp.path().join("acme/widgets.staging").exists());
        assert!(!tmp.path().join("acme/widgets.previous").exists());

        assert!(VectorIndex::remove(tmp.path(), "acme/widgets").await.unwrap());
        assert!(!VectorIndex::remove(tmp.path(), "acme/widgets").await.unwrap());
        assert!(matches!(
            VectorIndex::load(tmp.path(), "acme/widgets").await,
            Err(IndexError::IndexNotFound { repo_id }) if repo_id == "acme/widgets"
        ));
    }

    #[tokio::test]
    async fn interrupted_swap_still_loads_previous_index() {
        let tmp = tempfile::tempdir().unwrap();
        VectorIndex::new("acme/widgets", vec![node("acme/widgets", "a", 0, vec![1.0])])
            .unwrap()
            .persist(tmp.path())
            .await
            .unwrap();
        // State after the live dir was moved aside but before staging took its place.
        std::fs::rename(
            tmp.path().join("acme/widgets"),
            tmp.path().join("acme/widgets.previous"),
        )
        .unwrap();

        assert!(VectorIndex::exists(tmp.path(), "acme/widgets"));
        let loaded = VectorIndex::load(tmp.path(), "acme/widgets").await.unwrap();
        assert_eq!(loaded.len(), 1);

        let rebuilt = VectorIndex::new(
            "acme/widgets",
            vec![
                node("acme/widgets", "a", 0, vec![1.0]),
                node("acme/widgets", "b", 0, vec![0.5]),
            ],
        )
        .unwrap();
        rebuilt.persist(tmp.path()).await.unwrap();
        assert_eq!(VectorIndex::load(tmp.path(), "acme/widgets").await.unwrap().len(), 2);
        assert!(!tmp.path().join("acme/widgets.previous").exists());
    }

    #[tokio::test]
    async fn stale_previous_dir_does_not_block_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let index = VectorIndex::new("acme/widgets", vec![node("acme/widgets", "a", 0, vec![1.0])])
            .unwrap();
        index.persist(tmp.path()).await.unwrap();
        std::fs::create_dir_all(tmp.path().join("acme/widgets.previous/junk")).unwrap();

        index.persist(tmp.path()).await.unwrap();
        assert!(tmp.path().join("acme/widgets/index.json").is_file());
        assert!(!tmp.path().join("acme/widgets.previous").exists());

        assert!(VectorIndex::remove(tmp.path(), "acme/widgets").await.unwrap());
        assert!(!VectorIndex::exists(tmp.path(), "acme/widgets"));
    }

    #[tokio::test]
    async fn empty_index_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        VectorIndex::new("a/empty", Vec::new())
            .unwrap()
            .persist(tmp.path())
            .await
            .unwrap();
        let loaded = VectorIndex::load(tmp.path(), "a/empty").await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.search(&[1.0, 2.0], 5).unwrap(), Vec::new());
    }
}
