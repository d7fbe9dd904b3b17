//! Disk-based media backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use gift_registry_core::BlobKey;

use super::{Blob, MediaError, MediaStore};

/// Stores blobs on the local filesystem.
///
/// Files are sharded by the first two key characters,
/// `{root}/{shard}/{key}`, to keep directories small.
#[derive(Debug, Clone)]
pub struct DiskMediaStore {
    root: PathBuf,
}

impl DiskMediaStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &BlobKey) -> PathBuf {
        let key = key.as_str();
        let shard = key.get(..2).unwrap_or("_");
        self.root.join(shard).join(key)
    }

    fn io_error(key: &BlobKey, source: std::io::Error) -> MediaError {
        MediaError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn put(&self, key: &BlobKey, bytes: Vec<u8>) -> Result<(), MediaError> {
        let path = self.blob_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(key, e))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| Self::io_error(key, e))
    }

    async fn get(&self, key: &BlobKey) -> Result<Option<Blob>, MediaError> {
        match fs::read(self.blob_path(key)).await {
            Ok(bytes) => Ok(Some(Blob {
                bytes,
                content_type: key.content_type(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), MediaError> {
        match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool, MediaError> {
        fs::try_exists(self.blob_path(key))
            .await
            .map_err(|e| Self::io_error(key, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path());
        let key = BlobKey::parse("ab12.png").unwrap();

        store.put(&key, b"png bytes".to_vec()).await.unwrap();

        let blob = store.get(&key).await.unwrap().unwrap();
        assert_eq!(blob.bytes, b"png bytes");
        assert_eq!(blob.content_type, "image/png");
        assert!(dir.path().join("ab").join("ab12.png").exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path());
        let key = BlobKey::parse("missing.jpg").unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path());
        let key = BlobKey::generate(Some("photo.webp"));

        store.put(&key, vec![1, 2, 3]).await.unwrap();
        assert!(store.exists(&key).await.unwrap());

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_single_character_key_uses_fallback_shard() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path());
        let key = BlobKey::parse("x").unwrap();

        store.put(&key, vec![0]).await.unwrap();
        assert!(dir.path().join("_").join("x").exists());
    }
}
