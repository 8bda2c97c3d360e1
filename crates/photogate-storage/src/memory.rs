//! In-memory storage backend for development and tests

use crate::keys::validate_key;
use crate::traits::{ByteStream, ObjectStorage, PutOptions, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A committed object with the metadata it was written with
#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub data: Bytes,
    pub content_type: String,
    pub cache_control: Option<String>,
}

/// Storage that keeps objects in a shared map keyed by `(bucket, path)`.
///
/// Clones share the same map, so a test can hand one clone to the code under test and
/// inspect the other.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<(String, String), MemoryObject>>>,
    fail_uploads: Arc<AtomicBool>,
    deletes: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upload fail after reading its first chunk
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Get an object (for test assertions)
    pub fn get(&self, bucket: &str, path: &str) -> Option<MemoryObject> {
        self.objects
            .lock()
            .ok()?
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// Number of committed objects
    pub fn len(&self) -> usize {
        self.objects.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of delete calls that removed an object
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<(String, String), MemoryObject>>> {
        self.objects
            .lock()
            .map_err(|_| StorageError::BackendError("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        mut body: ByteStream,
        options: &PutOptions,
    ) -> StorageResult<StoredObject> {
        validate_key(path)?;
        let key = (bucket.to_string(), path.to_string());

        if !options.upsert && self.lock()?.contains_key(&key) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        let mut buffer = BytesMut::new();
        while let Some(item) = body.next().await {
            let chunk = item.map_err(|e| StorageError::Aborted(e.to_string()))?;
            buffer.extend_from_slice(&chunk);
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(StorageError::UploadFailed(
                    "injected failure: connection reset by peer".to_string(),
                ));
            }
        }

        let size = buffer.len() as u64;
        self.lock()?.insert(
            key,
            MemoryObject {
                data: buffer.freeze(),
                content_type: options.content_type.clone(),
                cache_control: options.cache_control_header(),
            },
        );

        tracing::debug!(bucket = %bucket, key = %path, size_bytes = size, "Memory storage upload");

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size,
        })
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        validate_key(path)?;
        let removed = self
            .lock()?
            .remove(&(bucket.to_string(), path.to_string()));
        if removed.is_some() {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        validate_key(path)?;
        Ok(self
            .lock()?
            .contains_key(&(bucket.to_string(), path.to_string())))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
