use crate::keys::validate_key;
use crate::traits::{ByteStream, ObjectStorage, PutOptions, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local filesystem storage implementation
///
/// Objects live at `{base_path}/{bucket}/{key}`. Uploads are written to a hidden sibling
/// file and renamed into place once the stream ends, so an aborted upload never leaves a
/// visible object behind.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/photogate")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert bucket and key to a filesystem path with security validation
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
            return Err(StorageError::InvalidKey(format!("Invalid bucket name: {}", bucket)));
        }
        validate_key(key)?;
        Ok(self.base_path.join(bucket).join(key))
    }

    fn partial_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.partial", name, Uuid::new_v4()))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn discard(partial: &Path) {
        if let Err(e) = fs::remove_file(partial).await {
            tracing::warn!(
                error = %e,
                path = %partial.display(),
                "Failed to remove partial upload"
            );
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        mut body: ByteStream,
        options: &PutOptions,
    ) -> StorageResult<StoredObject> {
        let target = self.object_path(bucket, path)?;
        let start = std::time::Instant::now();

        if !options.upsert && fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        self.ensure_parent_dir(&target).await?;

        let partial = Self::partial_path(&target);
        let mut file = fs::File::create(&partial).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                partial.display(),
                e
            ))
        })?;

        let mut size: u64 = 0;
        while let Some(item) = body.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    Self::discard(&partial).await;
                    tracing::debug!(
                        bucket = %bucket,
                        key = %path,
                        size_bytes = size,
                        "Local storage upload aborted by producer"
                    );
                    return Err(StorageError::Aborted(e.to_string()));
                }
            };

            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                Self::discard(&partial).await;
                return Err(StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    partial.display(),
                    e
                )));
            }
            size += chunk.len() as u64;
        }

        if let Err(e) = file.sync_all().await {
            drop(file);
            Self::discard(&partial).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                partial.display(),
                e
            )));
        }
        drop(file);

        if let Err(e) = fs::rename(&partial, &target).await {
            Self::discard(&partial).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to commit file {}: {}",
                target.display(),
                e
            )));
        }

        tracing::info!(
            path = %target.display(),
            bucket = %bucket,
            key = %path,
            content_type = %options.content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size,
        })
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        let target = self.object_path(bucket, path)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&target).await.map_err(|e| {
            StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                target.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %target.display(),
            bucket = %bucket,
            key = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let target = self.object_path(bucket, path)?;
        Ok(fs::try_exists(&target).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
