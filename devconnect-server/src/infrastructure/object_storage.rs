use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage io failed")]
    Io(#[from] std::io::Error),
}

/// Flat key/value blob store. Keys are relative, `/`-separated paths.
#[async_trait]
pub(crate) trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
    /// Returns `false` when nothing was stored under the key.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

#[derive(Debug, Clone)]
pub(crate) struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{LocalObjectStorage, ObjectStorage, StorageError};

    // The directory is removed when the returned guard drops.
    fn temp_storage() -> (TempDir, LocalObjectStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = LocalObjectStorage::new(dir.path().join("storage"));
        (dir, storage)
    }

    #[tokio::test]
    async fn put_then_delete_removes_file() {
        let (_dir, storage) = temp_storage();
        storage
            .put("post-images/1/100.png", b"png-bytes")
            .await
            .expect("put");

        let stored = storage.root().join("post-images/1/100.png");
        assert_eq!(tokio::fs::read(&stored).await.expect("read"), b"png-bytes");

        assert!(storage.delete("post-images/1/100.png").await.expect("delete"));
        assert!(!storage.delete("post-images/1/100.png").await.expect("delete"));
    }

    #[tokio::test]
    async fn keys_escaping_the_root_are_rejected() {
        let (dir, storage) = temp_storage();
        for key in ["../etc/passwd", "/abs/path", "", "post-images/../../x"] {
            let err = storage.put(key, b"x").await.expect_err("must reject");
            assert!(matches!(err, StorageError::InvalidKey(_)));
        }
        assert!(!dir.path().join("storage").exists());
    }
}
