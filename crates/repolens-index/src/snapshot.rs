use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunker::FileMeta;

/// A cloned repository at one commit.
///
/// Serialized field names match the registry file written by the cloning
/// side; `id` is the registry key and is filled in on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "repo_url")]
    pub url: String,
    #[serde(rename = "repo_path")]
    pub path: PathBuf,
    pub commit_hash: String,
    /// `%Y-%m-%d %H:%M:%S`, as recorded at clone or pull time.
    pub last_updated: String,
    #[serde(rename = "repo_structure", default)]
    pub structure: String,
}

impl RepoSnapshot {
    /// Browser link to `rel_path` pinned at this snapshot's commit.
    #[must_use]
    pub fn file_url(&self, rel_path: &str) -> String {
        let rel = rel_path.replace('\\', "/");
        format!(
            "{}/blob/{}/{}",
            self.url.trim_end_matches('/'),
            self.commit_hash,
            rel.trim_start_matches('/')
        )
    }

    /// Provenance shared by every chunk cut from `rel_path`.
    #[must_use]
    pub fn file_meta(&self, rel_path: &str) -> FileMeta {
        let rel = rel_path.replace('\\', "/");
        let file_name = Path::new(&rel)
            .file_name()
            .map_or_else(|| rel.clone(), |n| n.to_string_lossy().into_owned());
        FileMeta {
            file_name,
            url: self.file_url(&rel),
            last_updated: self.last_updated.clone(),
            rel_path: rel,
        }
    }
}

/// `owner/name` identifier of a remote URL, without a trailing `.git`.
#[must_use]
pub fn repo_id_from_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let path = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest.split_once('/').map_or(rest, |(_, p)| p));
    // scp-like `git@host:owner/name`
    let path = path.rsplit_once(':').map_or(path, |(_, p)| p);
    path.to_owned()
}
