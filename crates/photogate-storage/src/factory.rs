#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{MemoryStorage, ObjectStorage, StorageBackend, StorageError, StorageResult};
use photogate_core::StorageConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStorage>> {
    match config.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            Ok(Arc::new(S3Storage::new(region, config.s3_endpoint.clone())))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; uploaded objects are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: StorageBackend) -> StorageConfig {
        StorageConfig {
            backend,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
        }
    }

    #[tokio::test]
    async fn memory_backend_needs_no_settings() {
        let storage = create_storage(&config(StorageBackend::Memory)).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn s3_backend_requires_region() {
        let result = create_storage(&config(StorageBackend::S3)).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[cfg(feature = "storage-local")]
    #[tokio::test]
    async fn local_backend_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(StorageBackend::Local);
        cfg.local_storage_path = Some(dir.path().to_string_lossy().into_owned());

        let storage = create_storage(&cfg).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }
}
