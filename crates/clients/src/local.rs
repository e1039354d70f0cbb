use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use storymint_runtime::ObjectStorage;

/// Stores objects under a directory; the API serves that directory at `base_url`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self { root: root.into(), base_url: base_url.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(anyhow!("invalid storage key '{}'", key));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, key: &str, _content_type: &str, data: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, data).await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!("[LocalStorage::put] wrote {}", path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("storymint-local-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn writes_and_deletes_objects() {
        let root = scratch_dir("roundtrip");
        let storage = LocalStorage::new(&root, "/media/");

        storage.put("metadata/a.json", "application/json", b"{}".to_vec()).await.unwrap();
        assert_eq!(tokio::fs::read(root.join("metadata/a.json")).await.unwrap(), b"{}");
        assert_eq!(storage.url("metadata/a.json"), "/media/metadata/a.json");

        storage.delete("metadata/a.json").await.unwrap();
        assert!(!root.join("metadata/a.json").exists());
        // already gone
        storage.delete("metadata/a.json").await.unwrap();

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_root() {
        let storage = LocalStorage::new(scratch_dir("escape"), "/media");
        assert!(storage.put("../outside.png", "image/png", vec![1]).await.is_err());
        assert!(storage.delete("/etc/passwd").await.is_err());
    }
}
