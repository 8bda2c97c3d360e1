//! Storage abstraction trait
//!
//! This module defines the ObjectStorage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload aborted by producer: {0}")]
    Aborted(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Live byte source handed to a backend. An `Err` item means the producer gave up and the
/// backend must abandon the object instead of committing it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Per-object write options
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub content_type: String,
    /// Replace an existing object instead of failing with `AlreadyExists`
    pub upsert: bool,
    /// Either a bare number of seconds ("3600") or a full header value
    pub cache_control: Option<String>,
}

impl PutOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            upsert: false,
            cache_control: None,
        }
    }

    /// Cache-Control header value, expanding a bare seconds count to `max-age=N`
    pub fn cache_control_header(&self) -> Option<String> {
        self.cache_control.as_ref().map(|value| {
            if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                format!("max-age={}", value)
            } else {
                value.clone()
            }
        })
    }
}

/// Location and size of a committed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub path: String,
    pub size: u64,
}

/// Object storage abstraction
///
/// Backends consume uploads as a live stream and suspend until the transfer has been
/// committed or has failed. Keys are bucket-relative, `/`-separated and must not contain
/// `..` or a leading `/`.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload from a live stream. The object only becomes visible once the stream has ended
    /// cleanly; an error item aborts the transfer.
    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        body: ByteStream,
        options: &PutOptions,
    ) -> StorageResult<StoredObject>;

    /// Upload an in-memory buffer
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        options: &PutOptions,
    ) -> StorageResult<StoredObject> {
        let body: ByteStream = Box::pin(futures::stream::once(async move { Ok(data) }));
        self.upload_stream(bucket, path, body, options).await
    }

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_control_expands_seconds() {
        let mut options = PutOptions::new("image/png");
        assert_eq!(options.cache_control_header(), None);

        options.cache_control = Some("3600".to_string());
        assert_eq!(
            options.cache_control_header().as_deref(),
            Some("max-age=3600")
        );

        options.cache_control = Some("no-store".to_string());
        assert_eq!(options.cache_control_header().as_deref(), Some("no-store"));
    }
}
