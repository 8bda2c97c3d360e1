//! Per-file streaming pipeline
//!
//! `source -> sniffer -> limiter -> hasher -> sink -> storage`. The pump and the storage
//! transfer are two futures joined on the caller's task. The transfer does not start until
//! the sniffer has classified the stream, so rejected bytes never reach storage and the
//! object is created with the detected content type. Once the transfer ends the pump stops
//! waiting on the source, so a stalled client cannot hold a settled upload open.

use std::sync::OnceLock;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use photogate_core::UploadError;
use photogate_storage::{ByteStream, ObjectStorage, PutOptions, StorageError, StoredObject};
use tokio::sync::{oneshot, Notify};

use crate::hasher::ContentHasher;
use crate::limiter::SizeLimiter;
use crate::sink::{storage_sink, StorageSink};
use crate::sniffer::{Classification, SignatureSniffer};
use crate::stage::{ByteStage, Chain};

type Stages = Chain<Chain<SignatureSniffer, SizeLimiter>, ContentHasher>;

/// Everything one pipeline run needs besides the byte source and the storage client
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bucket: String,
    pub path: String,
    /// Client-declared content type, untrusted
    pub claimed_type: String,
    pub allowed_types: Vec<&'static str>,
    pub peek_bytes: usize,
    pub max_bytes: u64,
    pub owner_token: Option<String>,
    pub upsert: bool,
    pub cache_control: Option<String>,
    pub sink_buffer_chunks: usize,
}

/// Result of a pipeline that ran to completion
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub classification: Classification,
    /// Bytes counted by the limiter
    pub size: u64,
    pub hash: String,
    pub stored: StoredObject,
}

/// First-error-wins settlement shared by the pump and the transfer
#[derive(Default)]
struct Settlement(OnceLock<UploadError>);

impl Settlement {
    fn record(&self, err: UploadError) {
        if let Err(later) = self.0.set(err) {
            tracing::debug!(
                error = %later,
                error_type = later.error_type(),
                "Upload already settled, ignoring later error"
            );
        }
    }

    fn is_settled(&self) -> bool {
        self.0.get().is_some()
    }

    fn into_error(self) -> Option<UploadError> {
        self.0.into_inner()
    }
}

/// Drive `source` through the validation stages into `storage`.
///
/// On any failure the partially transferred object is abandoned, and an object that was
/// nevertheless committed is deleted, so an error never leaves anything behind.
pub async fn run_pipeline<S>(
    source: S,
    storage: &dyn ObjectStorage,
    settings: PipelineSettings,
) -> Result<PipelineReport, UploadError>
where
    S: Stream<Item = Result<Bytes, UploadError>> + Send + Unpin,
{
    let start = std::time::Instant::now();
    let (sniffer, classified) = SignatureSniffer::new(
        &settings.claimed_type,
        &settings.allowed_types,
        settings.peek_bytes,
    );
    let stages = sniffer
        .then(SizeLimiter::new(settings.max_bytes))
        .then(ContentHasher::new(settings.owner_token.clone()));
    let (sink, body) = storage_sink(settings.sink_buffer_chunks);
    let settlement = Settlement::default();
    let transfer_done = Notify::new();

    let storage_half = async {
        let outcome = transfer(storage, &settings, classified, body, &settlement).await;
        // notify_one keeps a permit, so a pump that is not yet waiting still sees it
        transfer_done.notify_one();
        outcome
    };

    let (pumped, transferred) = tokio::join!(
        pump(source, stages, sink, &settlement, &transfer_done),
        storage_half
    );

    let failure = match (settlement.into_error(), pumped, transferred) {
        (None, Some((size, hash)), Some((classification, stored))) => {
            tracing::debug!(
                bucket = %stored.bucket,
                key = %stored.path,
                mime_type = classification.mime_type,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload pipeline completed"
            );
            return Ok(PipelineReport {
                classification,
                size,
                hash,
                stored,
            });
        }
        (Some(err), _, transferred) => (err, transferred),
        (None, _, transferred) => (
            UploadError::StorageFailure("storage closed the upload stream early".to_string()),
            transferred,
        ),
    };

    let (err, transferred) = failure;
    if let Some((_, stored)) = transferred {
        discard(storage, &stored).await;
    }
    Err(err)
}

/// Storage half of a run. Starts once the stream is classified; a dropped sender means the
/// sniffer rejected the stream or the pump gave up.
async fn transfer(
    storage: &dyn ObjectStorage,
    settings: &PipelineSettings,
    classified: oneshot::Receiver<Classification>,
    body: ByteStream,
    settlement: &Settlement,
) -> Option<(Classification, StoredObject)> {
    let classification = classified.await.ok()?;
    let options = PutOptions {
        content_type: classification.mime_type.to_string(),
        upsert: settings.upsert,
        cache_control: settings.cache_control.clone(),
    };

    match storage
        .upload_stream(&settings.bucket, &settings.path, body, &options)
        .await
    {
        Ok(stored) => Some((classification, stored)),
        // The pump recorded its own reason before aborting
        Err(StorageError::Aborted(_)) => None,
        Err(e) => {
            tracing::error!(
                error = %e,
                bucket = %settings.bucket,
                key = %settings.path,
                backend = %storage.backend_type(),
                "Storage transfer failed"
            );
            settlement.record(UploadError::StorageFailure(e.to_string()));
            None
        }
    }
}

/// Best-effort removal of an object that must not outlive a failed upload
pub(crate) async fn discard(storage: &dyn ObjectStorage, stored: &StoredObject) {
    if let Err(e) = storage.delete(&stored.bucket, &stored.path).await {
        tracing::warn!(
            error = %e,
            bucket = %stored.bucket,
            key = %stored.path,
            "Failed to delete object after rejected upload"
        );
    }
}

/// Feed source chunks through the stages into the sink. Returns the byte count and digest
/// on a clean finish; on failure records the error, drops the stages (releasing a pending
/// classification) and aborts the sink. A transfer that ends while the source is still
/// open stops the pump at once, dropping the source.
async fn pump<S>(
    mut source: S,
    mut stages: Stages,
    mut sink: StorageSink,
    settlement: &Settlement,
    transfer_done: &Notify,
) -> Option<(u64, String)>
where
    S: Stream<Item = Result<Bytes, UploadError>> + Unpin,
{
    loop {
        if settlement.is_settled() {
            drop(stages);
            sink.abort("upload settled elsewhere").await;
            return None;
        }

        let item = tokio::select! {
            item = source.next() => item,
            _ = transfer_done.notified() => {
                tracing::debug!(
                    forwarded_bytes = sink.forwarded(),
                    "Storage transfer ended before the source, stopping upload"
                );
                drop(stages);
                drop(source);
                sink.abort("storage transfer ended").await;
                return None;
            }
        };

        let step = match item {
            Some(Ok(chunk)) => stages.push(chunk),
            Some(Err(err)) => Err(err),
            None => break,
        };

        match step {
            Ok(Some(bytes)) => {
                if !sink.send(bytes).await {
                    return None;
                }
            }
            Ok(None) => {}
            Err(err) => {
                drop(stages);
                drop(source);
                fail(err, sink, settlement).await;
                return None;
            }
        }
    }

    match stages.finish() {
        Ok(Some(bytes)) => {
            if !sink.send(bytes).await {
                return None;
            }
        }
        Ok(None) => {}
        Err(err) => {
            drop(stages);
            fail(err, sink, settlement).await;
            return None;
        }
    }

    let forwarded = sink.forwarded();
    sink.close();

    let Chain {
        first: Chain {
            second: limiter, ..
        },
        second: hasher,
    } = stages;
    debug_assert_eq!(limiter.total(), forwarded);
    Some((limiter.total(), hasher.finalize()))
}

async fn fail(err: UploadError, sink: StorageSink, settlement: &Settlement) {
    let reason = err.error_type();
    settlement.record(err);
    sink.abort(reason).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use photogate_core::mime::{IMAGE_JPEG, IMAGE_PNG, SUPPORTED_IMAGE_TYPES};
    use photogate_storage::MemoryStorage;

    fn settings(claimed: &str, max_bytes: u64) -> PipelineSettings {
        PipelineSettings {
            bucket: "photos".to_string(),
            path: "uploads/test.jpg".to_string(),
            claimed_type: claimed.to_string(),
            allowed_types: SUPPORTED_IMAGE_TYPES.to_vec(),
            peek_bytes: 64,
            max_bytes,
            owner_token: None,
            upsert: false,
            cache_control: None,
            sink_buffer_chunks: 2,
        }
    }

    fn jpeg(len: usize) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.resize(len, 0x5A);
        data
    }

    fn chunked(data: &[u8], size: usize) -> impl Stream<Item = Result<Bytes, UploadError>> + Send + Unpin {
        let chunks: Vec<_> = data
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(chunks)
    }

    #[tokio::test]
    async fn stores_with_detected_type() {
        let storage = MemoryStorage::new();
        let data = jpeg(5000);

        let report = run_pipeline(chunked(&data, 100), &storage, settings("", 10_000))
            .await
            .unwrap();

        assert_eq!(report.size, 5000);
        assert_eq!(report.classification.mime_type, IMAGE_JPEG);
        let object = storage.get("photos", "uploads/test.jpg").unwrap();
        assert_eq!(object.data, data);
        assert_eq!(object.content_type, IMAGE_JPEG);
    }

    #[tokio::test]
    async fn rejected_signature_never_touches_storage() {
        let storage = MemoryStorage::new();
        let err = run_pipeline(
            chunked(&jpeg(5000), 100),
            &storage,
            settings(IMAGE_PNG, 10_000),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::InvalidSignature { .. }));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn oversize_leaves_no_object() {
        let storage = MemoryStorage::new();
        let err = run_pipeline(
            chunked(&jpeg(5000), 100),
            &storage,
            settings(IMAGE_JPEG, 1000),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::SizeExceeded { limit: Some(1000) }));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn source_error_wins_and_aborts() {
        let storage = MemoryStorage::new();
        let mut items: Vec<Result<Bytes, UploadError>> = vec![Ok(Bytes::from(jpeg(200)))];
        items.push(Err(UploadError::MalformedRequest("connection reset".into())));
        items.push(Ok(Bytes::from_static(b"never read")));

        let err = run_pipeline(stream::iter(items), &storage, settings(IMAGE_JPEG, 10_000))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::MalformedRequest(_)));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_is_wrapped() {
        let storage = MemoryStorage::new();
        storage.fail_uploads(true);

        let err = run_pipeline(chunked(&jpeg(5000), 100), &storage, settings("", 10_000))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::StorageFailure(_)));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_stops_a_stalled_source() {
        let storage = MemoryStorage::new();
        storage.fail_uploads(true);
        let first: Result<Bytes, UploadError> = Ok(Bytes::from(jpeg(128)));
        let stalled = stream::iter(vec![first]).chain(stream::pending());

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            run_pipeline(stalled, &storage, settings("", 10_000)),
        )
        .await
        .expect("pipeline should end once storage has failed");

        assert!(matches!(outcome, Err(UploadError::StorageFailure(_))));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn empty_source_completes_with_zero_bytes() {
        let storage = MemoryStorage::new();
        let report = run_pipeline(chunked(&[], 1), &storage, settings(IMAGE_JPEG, 10_000))
            .await
            .unwrap();

        assert_eq!(report.size, 0);
        assert_eq!(report.classification.mime_type, IMAGE_JPEG);
    }

    #[tokio::test]
    async fn existing_object_is_not_overwritten() {
        let storage = MemoryStorage::new();
        run_pipeline(chunked(&jpeg(500), 100), &storage, settings("", 10_000))
            .await
            .unwrap();

        let err = run_pipeline(chunked(&jpeg(700), 100), &storage, settings("", 10_000))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::StorageFailure(_)));
        assert_eq!(storage.get("photos", "uploads/test.jpg").unwrap().data.len(), 500);
    }
}
