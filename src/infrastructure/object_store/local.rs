//! Filesystem-backed object store for development and tests. URIs are
//! `local://{key}`; keys map to paths under the configured base directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::application::ports::{ObjectStore, StorageError};

pub struct LocalObjectStore {
    base_path: PathBuf,
    max_bytes: u64,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            base_path: base_path.into(),
            max_bytes,
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        // Keys are server-generated, but a traversal segment would still be a
        // bug worth refusing loudly.
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }

    fn key_of(uri: &str) -> Result<&str, StorageError> {
        uri.strip_prefix("local://")
            .ok_or_else(|| StorageError::NotFound(uri.to_string()))
    }

    fn io_err(e: std::io::Error) -> StorageError {
        StorageError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], _mime: &str) -> Result<String, StorageError> {
        if bytes.len() as u64 > self.max_bytes {
            return Err(StorageError::PayloadTooLarge {
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(Self::io_err)?;
        }

        // Write-then-rename so a concurrent reader never sees half an object.
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, bytes).await.map_err(Self::io_err)?;
        fs::rename(&tmp, &path).await.map_err(Self::io_err)?;

        Ok(format!("local://{}", key))
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(Self::key_of(uri)?)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(uri.to_string()))
            }
            Err(e) => Err(Self::io_err(e)),
        }
    }

    async fn delete(&self, uri: &str) -> Result<(), StorageError> {
        let path = self.path_for(Self::key_of(uri)?)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(e)),
        }
    }

    async fn exists(&self, uri: &str) -> Result<bool, StorageError> {
        let path = self.path_for(Self::key_of(uri)?)?;
        Ok(Path::new(&path).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(limit: u64) -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), limit);
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (_dir, store) = store(1024);
        let uri = store
            .put("acme/1/abc.pdf", b"content", "application/pdf")
            .await
            .unwrap();
        assert!(uri.starts_with("local://"));
        assert_eq!(store.get(&uri).await.unwrap(), b"content");
        assert!(store.exists(&uri).await.unwrap());
    }

    #[tokio::test]
    async fn oversize_payload_is_rejected() {
        let (_dir, store) = store(4);
        let err = store
            .put("acme/1/big.bin", b"too large", "application/octet-stream")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (_dir, store) = store(1024);
        let err = store.get("local://acme/1/absent.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = store(1024);
        let uri = store.put("acme/1/x.txt", b"x", "text/plain").await.unwrap();
        store.delete(&uri).await.unwrap();
        store.delete(&uri).await.unwrap();
        assert!(!store.exists(&uri).await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_are_refused() {
        let (_dir, store) = store(1024);
        assert!(store.put("../escape", b"x", "text/plain").await.is_err());
    }
}
