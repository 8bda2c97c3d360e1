use photogate_core::mime::{is_unknown_claim, normalize_mime_type, supported_image_type};
use photogate_core::{UploadConfig, UploadError};
use photogate_storage::keys::{generate_storage_key, validate_key};

use crate::filename::generate_storage_filename;
use crate::pipeline::PipelineSettings;

/// Per-request options supplied by the caller rather than the client
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Scopes the content hash to one owner
    pub owner_token: Option<String>,
    /// Explicit object path replacing the generated `{prefix}/{filename}`
    pub path_override: Option<String>,
}

/// One primary file upload, created when its multipart part begins.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub field_name: String,
    /// Normalized client claim, untrusted
    pub claimed_type: String,
    /// Client filename as sent, untrusted
    pub original_filename: String,
    /// `{uuid}-{sanitized original}`
    pub filename: String,
    pub bucket: String,
    pub path: String,
    pub max_bytes: u64,
    pub owner_token: Option<String>,
}

impl UploadSession {
    /// Pre-filter the claimed type and resolve the target path.
    pub fn begin(
        config: &UploadConfig,
        request: &UploadRequest,
        field_name: &str,
        claimed_type: Option<&str>,
        original_filename: Option<&str>,
    ) -> Result<Self, UploadError> {
        let claimed_type = normalize_mime_type(claimed_type.unwrap_or_default());
        if !is_unknown_claim(&claimed_type) {
            let allowed = supported_image_type(&claimed_type)
                .is_some_and(|t| config.allowed_types.contains(&t));
            if !allowed {
                return Err(UploadError::InvalidMimeClaim(claimed_type));
            }
        }

        let original_filename = original_filename.unwrap_or_default().to_string();
        let filename = generate_storage_filename(&original_filename);

        let path = match request.path_override.as_deref() {
            Some(path) => {
                validate_key(path).map_err(|e| UploadError::StorageFailure(e.to_string()))?;
                path.to_string()
            }
            None => generate_storage_key(&config.path_prefix, &filename),
        };

        Ok(Self {
            field_name: field_name.to_string(),
            claimed_type,
            original_filename,
            filename,
            bucket: config.bucket.clone(),
            path,
            max_bytes: config.max_bytes,
            owner_token: request.owner_token.clone(),
        })
    }

    pub fn pipeline_settings(&self, config: &UploadConfig) -> PipelineSettings {
        PipelineSettings {
            bucket: self.bucket.clone(),
            path: self.path.clone(),
            claimed_type: self.claimed_type.clone(),
            allowed_types: config.allowed_types.clone(),
            peek_bytes: config.peek_bytes,
            max_bytes: self.max_bytes,
            owner_token: self.owner_token.clone(),
            upsert: config.allow_overwrite,
            cache_control: config.cache_control.clone(),
            sink_buffer_chunks: config.sink_buffer_chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photogate_core::mime::IMAGE_PNG;

    fn begin(claimed: Option<&str>, request: &UploadRequest) -> Result<UploadSession, UploadError> {
        UploadSession::begin(
            &UploadConfig::default(),
            request,
            "photo",
            claimed,
            Some("holiday pic.png"),
        )
    }

    #[test]
    fn generated_path_uses_prefix_and_sanitized_name() {
        let session = begin(Some("image/png"), &UploadRequest::default()).unwrap();
        assert!(session.path.starts_with("uploads/"));
        assert!(session.path.ends_with("-holiday_pic.png"));
        assert_eq!(session.original_filename, "holiday pic.png");
        assert_eq!(session.bucket, "photos");
    }

    #[test]
    fn unknown_claims_pass_the_prefilter() {
        assert!(begin(None, &UploadRequest::default()).is_ok());
        assert!(begin(Some("application/octet-stream"), &UploadRequest::default()).is_ok());
    }

    #[test]
    fn disallowed_claim_is_rejected_before_any_bytes() {
        let err = begin(Some("text/html"), &UploadRequest::default()).unwrap_err();
        assert!(matches!(err, UploadError::InvalidMimeClaim(ref t) if t == "text/html"));

        let config = UploadConfig {
            allowed_types: vec![IMAGE_PNG],
            ..UploadConfig::default()
        };
        let err = UploadSession::begin(
            &config,
            &UploadRequest::default(),
            "photo",
            Some("image/jpeg"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, UploadError::InvalidMimeClaim(_)));
    }

    #[test]
    fn override_path_is_used_verbatim() {
        let request = UploadRequest {
            owner_token: Some("user-1".to_string()),
            path_override: Some("avatars/user-1.png".to_string()),
        };
        let session = begin(Some("image/png"), &request).unwrap();
        assert_eq!(session.path, "avatars/user-1.png");
        assert_eq!(session.owner_token.as_deref(), Some("user-1"));
    }

    #[test]
    fn traversal_override_is_refused() {
        let request = UploadRequest {
            owner_token: None,
            path_override: Some("../other-bucket/x.png".to_string()),
        };
        assert!(matches!(
            begin(Some("image/png"), &request),
            Err(UploadError::StorageFailure(_))
        ));
    }
}
