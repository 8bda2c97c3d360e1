//! Upload orchestration
//!
//! Walks the multipart parts of one request: the primary file is streamed through the
//! validation pipeline into storage, the thumbnail is buffered on the side, and scalar
//! fields are captured into a bounded map. Either the whole request succeeds or nothing it
//! wrote is left behind.

use std::pin::pin;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use futures::TryStreamExt;
use photogate_core::mime::normalize_mime_type;
use photogate_core::{UploadConfig, UploadError};
use photogate_storage::keys::thumbnail_key;
use photogate_storage::{ObjectStorage, PutOptions, StoredObject};

use crate::fields::FormFields;
use crate::outcome::UploadOutcome;
use crate::pipeline::{discard, run_pipeline, PipelineReport};
use crate::session::{UploadRequest, UploadSession};
use crate::thumbnail::{Thumbnail, ThumbnailBuffer};

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Everything gathered from one request before the outcome is assembled
struct Parts {
    session: UploadSession,
    report: PipelineReport,
    fields: FormFields,
    thumbnail: Option<ThumbnailBuffer>,
}

/// Streaming image ingest service
pub struct UploadService {
    storage: Arc<dyn ObjectStorage>,
    config: UploadConfig,
}

impl UploadService {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: UploadConfig) -> Self {
        Self { storage, config }
    }

    /// Ingest one `multipart/form-data` request.
    ///
    /// The content type is checked before the body is touched. Body size is additionally
    /// bounded by any `DefaultBodyLimit` configured on the router.
    pub async fn ingest(
        &self,
        request: Request,
        options: UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        let is_multipart = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| normalize_mime_type(value) == MULTIPART_FORM_DATA);
        if !is_multipart {
            return Err(UploadError::NoFilePresent);
        }

        let multipart = Multipart::from_request(request, &()).await.map_err(|rejection| {
            tracing::debug!(error = %rejection, "Multipart extraction rejected");
            UploadError::NoFilePresent
        })?;

        self.ingest_multipart(multipart, options).await
    }

    /// Ingest from an already extracted multipart body.
    pub async fn ingest_multipart(
        &self,
        mut multipart: Multipart,
        options: UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        let mut written: Option<StoredObject> = None;

        let parts = match self.read_parts(&mut multipart, &options, &mut written).await {
            Ok(parts) => parts,
            Err(err) => {
                if let Some(stored) = written {
                    discard(self.storage.as_ref(), &stored).await;
                }
                return Err(err);
            }
        };

        let Parts {
            session,
            report,
            fields,
            thumbnail,
        } = parts;

        let thumbnail_path = match thumbnail.and_then(|b| b.finish(&self.config.allowed_types)) {
            Some(thumbnail) => self.store_thumbnail(&report.stored, thumbnail).await,
            None => None,
        };

        tracing::info!(
            bucket = %report.stored.bucket,
            key = %report.stored.path,
            mime_type = report.classification.mime_type,
            claim_matched = report.classification.claim_matched,
            size_bytes = report.size,
            fields = fields.len(),
            thumbnail = thumbnail_path.is_some(),
            "Upload ingested"
        );

        Ok(UploadOutcome {
            filename: session.filename,
            original_filename: session.original_filename,
            mime_type: report.classification.mime_type.to_string(),
            hash: report.hash,
            path: report.stored.path,
            bucket: report.stored.bucket,
            size: report.size,
            fields: fields.into_map(),
            thumbnail_path,
        })
    }

    /// Consume every part. `written` is set as soon as the primary object exists so the
    /// caller can remove it if anything later fails.
    async fn read_parts(
        &self,
        multipart: &mut Multipart,
        options: &UploadRequest,
        written: &mut Option<StoredObject>,
    ) -> Result<Parts, UploadError> {
        let mut primary: Option<(UploadSession, PipelineReport)> = None;
        let mut thumbnail: Option<ThumbnailBuffer> = None;
        let mut fields = FormFields::new(
            self.config.field_value_max_chars,
            self.config.field_max_count,
        );
        let mut file_parts = 0usize;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(source_error)?
        {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();

            if name == self.config.field_name {
                if primary.is_some() {
                    return Err(UploadError::TooManyFiles(format!(
                        "field '{}' sent more than once",
                        name
                    )));
                }
                file_parts += 1;
                self.check_file_count(file_parts)?;

                let session = UploadSession::begin(
                    &self.config,
                    options,
                    &name,
                    field.content_type(),
                    field.file_name(),
                )?;
                let source = pin!(field.map_err(source_error));
                let report = run_pipeline(
                    source,
                    self.storage.as_ref(),
                    session.pipeline_settings(&self.config),
                )
                .await?;

                *written = Some(report.stored.clone());
                primary = Some((session, report));
            } else if name == self.config.thumbnail_field_name {
                file_parts += 1;
                self.check_file_count(file_parts)?;

                if thumbnail.is_some() {
                    tracing::debug!(field = %name, "Ignoring repeated thumbnail field");
                    continue;
                }
                let mut buffer = ThumbnailBuffer::new(self.config.thumbnail_max_bytes);
                buffer.fill(pin!(field)).await;
                thumbnail = Some(buffer);
            } else if is_file {
                file_parts += 1;
                self.check_file_count(file_parts)?;
                tracing::debug!(field = %name, "Ignoring unexpected file field");
            } else if fields.has_room() {
                let value = fields
                    .read_value(pin!(field))
                    .await
                    .map_err(source_error)?;
                fields.insert(&name, &value);
            }
        }

        let (session, report) = primary.ok_or(UploadError::NoFilePresent)?;

        if report.size == 0 {
            return Err(UploadError::EmptyFile);
        }

        Ok(Parts {
            session,
            report,
            fields,
            thumbnail,
        })
    }

    fn check_file_count(&self, file_parts: usize) -> Result<(), UploadError> {
        if file_parts > self.config.max_files {
            return Err(UploadError::TooManyFiles(format!(
                "at most {} file parts are accepted",
                self.config.max_files
            )));
        }
        Ok(())
    }

    /// Best-effort; a failure never affects the primary upload.
    async fn store_thumbnail(&self, parent: &StoredObject, thumbnail: Thumbnail) -> Option<String> {
        let path = thumbnail_key(&parent.path);
        let options = PutOptions {
            content_type: thumbnail.mime_type.to_string(),
            upsert: self.config.allow_overwrite,
            cache_control: self.config.cache_control.clone(),
        };

        match self
            .storage
            .upload(&parent.bucket, &path, thumbnail.data, &options)
            .await
        {
            Ok(stored) => Some(stored.path),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bucket = %parent.bucket,
                    key = %path,
                    "Thumbnail upload failed"
                );
                None
            }
        }
    }
}

/// Map a decoder failure. A request body limit tripping surfaces as `SizeExceeded` without a
/// file ceiling, since the limit lives on the router; anything else means the body itself is
/// broken.
fn source_error(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::SizeExceeded { limit: None }
    } else {
        UploadError::MalformedRequest(err.body_text())
    }
}
