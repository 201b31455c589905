//! JSON registry of cloned repositories, keyed by `owner/name`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use repolens_index::RepoSnapshot;
use repolens_index::snapshot::repo_id_from_url;
use repolens_index::store::VectorIndex;
use repolens_index::structure::render_tree;

use crate::error::{ChatError, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct RepoRegistry {
    path: PathBuf,
}

impl RepoRegistry {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, RepoSnapshot>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut records: BTreeMap<String, RepoSnapshot> = serde_json::from_str(&content)
            .map_err(|e| ChatError::Registry(format!("{}: {e}", self.path.display())))?;
        for (id, snapshot) in &mut records {
            snapshot.id.clone_from(id);
        }
        Ok(records)
    }

    fn write(&self, records: &BTreeMap<String, RepoSnapshot>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepoNotFound` for an unknown id, or `Registry` if the file is corrupt.
    pub fn get(&self, id: &str) -> Result<RepoSnapshot> {
        self.read()?
            .remove(id)
            .ok_or_else(|| ChatError::RepoNotFound(id.to_owned()))
    }

    /// Every registered repository, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the file is corrupt.
    pub fn list_all(&self) -> Result<Vec<RepoSnapshot>> {
        Ok(self.read()?.into_values().collect())
    }

    /// Insert or replace the record for `snapshot.id`.
    ///
    /// # Errors
    ///
    /// Returns an IO or registry error.
    pub fn upsert(&self, snapshot: &RepoSnapshot) -> Result<()> {
        let mut records = self.read()?;
        records.insert(snapshot.id.clone(), snapshot.clone());
        self.write(&records)?;
        tracing::info!(repo = %snapshot.id, commit = %snapshot.commit_hash, "repository registered");
        Ok(())
    }

    /// Remove the record of `id` and its persisted index under `index_root`.
    ///
    /// # Errors
    ///
    /// Returns `RepoNotFound` for an unknown id, or an IO error.
    pub async fn remove(&self, id: &str, index_root: &Path) -> Result<RepoSnapshot> {
        let mut records = self.read()?;
        let snapshot = records
            .remove(id)
            .ok_or_else(|| ChatError::RepoNotFound(id.to_owned()))?;
        let had_index = VectorIndex::remove(index_root, id).await?;
        self.write(&records)?;
        tracing::info!(repo = id, had_index, "repository removed");
        Ok(snapshot)
    }
}

/// Snapshot of a local checkout: id from the remote URL, timestamp now,
/// structure rendered from disk.
///
/// # Errors
///
/// Returns `Registry` if the checkout cannot be listed.
pub fn capture_snapshot(url: &str, path: &Path, commit_hash: &str) -> Result<RepoSnapshot> {
    let structure = render_tree(path)
        .map_err(|e| ChatError::Registry(format!("{}: {e}", path.display())))?;
    Ok(RepoSnapshot {
        id: repo_id_from_url(url),
        url: url.trim_end_matches('/').trim_end_matches(".git").to_owned(),
        path: path.to_path_buf(),
        commit_hash: commit_hash.to_owned(),
        last_updated: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        structure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str) -> RepoSnapshot {
        RepoSnapshot {
            id: id.into(),
            url: format!("https://github.com/{id}"),
            path: PathBuf::from(format!("repos/{id}")),
            commit_hash: "abc123".into(),
            last_updated: "2024-05-01 10:00:00".into(),
            structure: "├── widgets".into(),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = RepoRegistry::new(tmp.path().join("repo_infos.json"));
        assert!(reg.list_all().unwrap().is_empty());
        assert!(matches!(reg.get("a/b"), Err(ChatError::RepoNotFound(id)) if id == "a/b"));
    }

    #[test]
    fn upsert_get_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let reg = RepoRegistry::new(tmp.path().join("data/repo_infos.json"));
        reg.upsert(&snapshot("zeta/z")).unwrap();
        reg.upsert(&snapshot("acme/widgets")).unwrap();

        let mut updated = snapshot("acme/widgets");
        updated.commit_hash = "def456".into();
        reg.upsert(&updated).unwrap();

        let all = reg.list_all().unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["acme/widgets", "zeta/z"]);
        assert_eq!(reg.get("acme/widgets").unwrap().commit_hash, "def456");
    }

    #[test]
    fn file_uses_registry_field_names() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("repo_infos.json");
        RepoRegistry::new(&path).upsert(&snapshot("acme/widgets")).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &raw["acme/widgets"];
        for key in ["repo_url", "repo_path", "commit_hash", "last_updated", "repo_structure"] {
            assert!(record.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn corrupt_file_is_registry_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("repo_infos.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            RepoRegistry::new(&path).list_all(),
            Err(ChatError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn remove_deletes_record_and_index() {
        let tmp = tempfile::tempdir().unwrap();
        let index_root = tmp.path().join("vec_db");
        let reg = RepoRegistry::new(tmp.path().join("repo_infos.json"));
        reg.upsert(&snapshot("acme/widgets")).unwrap();
        VectorIndex::new("acme/widgets", Vec::new())
            .unwrap()
            .persist(&index_root)
            .await
            .unwrap();

        let removed = reg.remove("acme/widgets", &index_root).await.unwrap();
        assert_eq!(removed.id, "acme/widgets");
        assert!(!VectorIndex::exists(&index_root, "acme/widgets"));
        assert!(reg.list_all().unwrap().is_empty());
        assert!(matches!(
            reg.remove("acme/widgets", &index_root).await,
            Err(ChatError::RepoNotFound(_))
        ));
    }

    #[test]
    fn capture_renders_structure() {
        let tmp = tempfile::tempdir().unwrap();
        let checkout = tmp.path().join("widgets");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(checkout.join("main.cpp"), "int main() {}").unwrap();

        let snap = capture_snapshot("https://github.com/acme/widgets.git", &checkout, "abc").unwrap();
        assert_eq!(snap.id, "acme/widgets");
        assert_eq!(snap.url, "https://github.com/acme/widgets");
        assert_eq!(snap.structure, "├── widgets\n└── main.cpp");
        assert_eq!(snap.last_updated.len(), 19);
    }
}
