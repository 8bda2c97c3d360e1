use crate::keys::validate_key;
use crate::traits::{ByteStream, ObjectStorage, PutOptions, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutMode, PutMultipartOptions,
    PutOptions as ObjectPutOptions, PutPayload, WriteMultipart,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Parts uploaded concurrently per object before the producer is made to wait
const MAX_CONCURRENT_PARTS: usize = 4;

/// S3 storage implementation
///
/// Streams uploads through S3 multipart uploads so a file is never held in memory as a
/// whole. One client is built lazily per bucket.
pub struct S3Storage {
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    stores: RwLock<HashMap<String, Arc<AmazonS3>>>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(region: String, endpoint_url: Option<String>) -> Self {
        S3Storage {
            region,
            endpoint_url,
            stores: RwLock::new(HashMap::new()),
        }
    }

    fn store_for(&self, bucket: &str) -> StorageResult<Arc<AmazonS3>> {
        if let Some(store) = self
            .stores
            .read()
            .map_err(|_| StorageError::BackendError("S3 client cache poisoned".to_string()))?
            .get(bucket)
        {
            return Ok(store.clone());
        }

        // Build AmazonS3 object store from environment and explicit settings.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(self.region.clone())
            .with_bucket_name(bucket.to_string());

        if let Some(ref endpoint) = self.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );

        self.stores
            .write()
            .map_err(|_| StorageError::BackendError("S3 client cache poisoned".to_string()))?
            .insert(bucket.to_string(), store.clone());

        Ok(store)
    }

    fn attributes(options: &PutOptions) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, options.content_type.clone().into());
        if let Some(cache_control) = options.cache_control_header() {
            attributes.insert(Attribute::CacheControl, cache_control.into());
        }
        attributes
    }

    async fn head_exists(store: &AmazonS3, location: &Path) -> StorageResult<bool> {
        match store.head(location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_stream(
        &self,
        bucket: &str,
        path: &str,
        mut body: ByteStream,
        options: &PutOptions,
    ) -> StorageResult<StoredObject> {
        validate_key(path)?;
        let store = self.store_for(bucket)?;
        let location = Path::from(path.to_string());
        let start = std::time::Instant::now();

        // Multipart uploads have no create-only mode, so the overwrite guard is a HEAD check.
        if !options.upsert && Self::head_exists(&store, &location).await? {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        let upload = store
            .put_multipart_opts(
                &location,
                PutMultipartOptions {
                    attributes: Self::attributes(options),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let mut writer = WriteMultipart::new(upload);

        let mut size: u64 = 0;
        while let Some(item) = body.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Err(abort_err) = writer.abort().await {
                        tracing::warn!(
                            error = %abort_err,
                            bucket = %bucket,
                            key = %path,
                            "S3 multipart abort failed"
                        );
                    }
                    return Err(StorageError::Aborted(e.to_string()));
                }
            };

            if let Err(e) = writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %path,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 part upload failed"
                );
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(error = %abort_err, key = %path, "S3 multipart abort failed");
                }
                return Err(StorageError::UploadFailed(e.to_string()));
            }

            size += chunk.len() as u64;
            writer.put(chunk);
        }

        writer.finish().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 stream upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            content_type = %options.content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size,
        })
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        options: &PutOptions,
    ) -> StorageResult<StoredObject> {
        validate_key(path)?;
        let store = self.store_for(bucket)?;
        let location = Path::from(path.to_string());
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let put_options = ObjectPutOptions {
            mode: if options.upsert {
                PutMode::Overwrite
            } else {
                PutMode::Create
            },
            attributes: Self::attributes(options),
            ..Default::default()
        };

        store
            .put_opts(&location, PutPayload::from(data), put_options)
            .await
            .map_err(|e| match e {
                ObjectStoreError::AlreadyExists { .. } => {
                    StorageError::AlreadyExists(path.to_string())
                }
                other => {
                    tracing::error!(
                        error = %other,
                        bucket = %bucket,
                        key = %path,
                        size_bytes = size,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 upload failed"
                    );
                    StorageError::UploadFailed(other.to_string())
                }
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size,
        })
    }

    async fn delete(&self, bucket: &str, path: &str) -> StorageResult<()> {
        validate_key(path)?;
        let store = self.store_for(bucket)?;
        let start = std::time::Instant::now();
        let location = Path::from(path.to_string());

        match store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %bucket,
            key = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        validate_key(path)?;
        let store = self.store_for(bucket)?;
        let location = Path::from(path.to_string());
        Self::head_exists(&store, &location).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
