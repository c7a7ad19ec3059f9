use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Transient backend failure; the job runner retries these.
    #[error("object store unavailable: {0}")]
    Unavailable(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("payload of {size} bytes exceeds the {limit} byte cap")]
    PayloadTooLarge { size: u64, limit: u64 },
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Raw upload and artifact storage. Returned URIs are opaque to callers; the
/// only way back to the bytes is `get`. `put` is atomic: a reader never
/// observes a partial object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], mime: &str) -> Result<String, StorageError>;

    async fn get(&self, uri: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, uri: &str) -> Result<(), StorageError>;

    async fn exists(&self, uri: &str) -> Result<bool, StorageError>;
}
