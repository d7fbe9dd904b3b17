//! Media store for product images.
//!
//! Images are addressed by opaque [`BlobKey`]s generated at upload time. A
//! product references its image by key only; nothing ties the blob's
//! lifetime to the row, so the product service deletes replaced and orphaned
//! images itself.

pub mod disk;

use async_trait::async_trait;

use gift_registry_core::BlobKey;

pub use disk::DiskMediaStore;

/// Errors that can occur in a media backend.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Filesystem or transport failure.
    #[error("media I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The key cannot address a blob in this backend.
    #[error("invalid media key: {0}")]
    InvalidKey(String),

    /// Upload exceeds the configured limit.
    #[error("upload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
}

/// Bytes of a stored blob plus the type to serve them with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Key-addressed blob storage backend.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store bytes under a key, replacing any existing blob.
    async fn put(&self, key: &BlobKey, bytes: Vec<u8>) -> Result<(), MediaError>;

    /// Retrieve a blob, `None` when the key is unknown.
    async fn get(&self, key: &BlobKey) -> Result<Option<Blob>, MediaError>;

    /// Delete a blob. Deleting an unknown key succeeds.
    async fn delete(&self, key: &BlobKey) -> Result<(), MediaError>;

    /// Whether a blob is stored under the key.
    async fn exists(&self, key: &BlobKey) -> Result<bool, MediaError>;
}
