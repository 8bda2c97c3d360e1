//! Error types module
//!
//! Every upload session ends in at most one `UploadError`. Variants are the complete
//! taxonomy callers key their responses on; raw storage or transport text is kept in
//! the variant payload for logging only and never reaches `client_message`.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for rejected uploads worth noticing
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "SIZE_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file provided")]
    NoFilePresent,

    #[error("Invalid content type: {0}")]
    InvalidMimeClaim(String),

    #[error("File signature does not match claimed type {claimed:?} (detected: {detected:?})")]
    InvalidSignature {
        claimed: String,
        detected: Option<&'static str>,
    },

    /// `limit` is the file ceiling that tripped, or `None` when a request body limit outside
    /// the pipeline cut the stream short.
    #[error("Upload exceeds maximum size ({})", describe_limit(.limit))]
    SizeExceeded { limit: Option<u64> },

    #[error("Too many files: {0}")]
    TooManyFiles(String),

    #[error("Empty file")]
    EmptyFile,

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Malformed multipart body: {0}")]
    MalformedRequest(String),
}

fn describe_limit(limit: &Option<u64>) -> String {
    match limit {
        Some(bytes) => format_size(*bytes),
        None => "request body limit".to_string(),
    }
}

/// Largest whole unit that represents `bytes` exactly
fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    match bytes {
        0 => "0 bytes".to_string(),
        b if b % MIB == 0 => format!("{} MB", b / MIB),
        b if b % KIB == 0 => format!("{} KB", b / KIB),
        b => format!("{b} bytes"),
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn upload_error_static_metadata(
    err: &UploadError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        UploadError::NoFilePresent => (
            400,
            "NO_FILE_PRESENT",
            false,
            Some("Send a multipart/form-data request with a file field"),
            false,
            LogLevel::Debug,
        ),
        UploadError::InvalidMimeClaim(_) => (
            415,
            "INVALID_MIME_TYPE",
            false,
            Some("Upload a JPEG, PNG, GIF, WEBP, BMP, TIFF or HEIC image"),
            false,
            LogLevel::Debug,
        ),
        UploadError::InvalidSignature { .. } => (
            415,
            "INVALID_FILE_SIGNATURE",
            false,
            Some("Check that the file is a real image of the declared type"),
            false,
            LogLevel::Warn,
        ),
        UploadError::SizeExceeded { .. } => (
            413,
            "SIZE_EXCEEDED",
            false,
            Some("Reduce file size and try again"),
            false,
            LogLevel::Debug,
        ),
        UploadError::TooManyFiles(_) => (
            400,
            "TOO_MANY_FILES",
            false,
            Some("Send exactly one image file per request"),
            false,
            LogLevel::Debug,
        ),
        UploadError::EmptyFile => (
            400,
            "EMPTY_FILE",
            false,
            Some("Select a non-empty image file"),
            false,
            LogLevel::Debug,
        ),
        UploadError::StorageFailure(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        UploadError::MalformedRequest(_) => (
            400,
            "MALFORMED_REQUEST",
            false,
            Some("Check the multipart request encoding"),
            true,
            LogLevel::Debug,
        ),
    }
}

impl UploadError {
    /// Short variant name, used as a structured logging field
    pub fn error_type(&self) -> &'static str {
        match self {
            UploadError::NoFilePresent => "NoFilePresent",
            UploadError::InvalidMimeClaim(_) => "InvalidMimeClaim",
            UploadError::InvalidSignature { .. } => "InvalidSignature",
            UploadError::SizeExceeded { .. } => "SizeExceeded",
            UploadError::TooManyFiles(_) => "TooManyFiles",
            UploadError::EmptyFile => "EmptyFile",
            UploadError::StorageFailure(_) => "StorageFailure",
            UploadError::MalformedRequest(_) => "MalformedRequest",
        }
    }
}

impl ErrorMetadata for UploadError {
    fn http_status_code(&self) -> u16 {
        upload_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        upload_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        upload_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::NoFilePresent => "No file provided".to_string(),
            UploadError::InvalidMimeClaim(_) => "Unsupported file type".to_string(),
            UploadError::InvalidSignature { .. } => {
                "File content is not a valid image of the declared type".to_string()
            }
            UploadError::SizeExceeded { limit: Some(limit) } => format!(
                "File exceeds maximum allowed size of {}",
                format_size(*limit)
            ),
            UploadError::SizeExceeded { limit: None } => {
                "Request exceeds maximum allowed size".to_string()
            }
            UploadError::TooManyFiles(_) => "Only one file may be uploaded".to_string(),
            UploadError::EmptyFile => "File is empty".to_string(),
            UploadError::StorageFailure(_) => "Failed to store file".to_string(),
            UploadError::MalformedRequest(_) => "Malformed upload request".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(UploadError::SizeExceeded { limit: Some(10) }.http_status_code(), 413);
        assert_eq!(UploadError::SizeExceeded { limit: None }.http_status_code(), 413);
        assert_eq!(
            UploadError::InvalidMimeClaim("text/html".into()).http_status_code(),
            415
        );
        assert_eq!(
            UploadError::InvalidSignature {
                claimed: "image/jpeg".into(),
                detected: None
            }
            .http_status_code(),
            415
        );
        assert_eq!(UploadError::NoFilePresent.http_status_code(), 400);
        assert_eq!(UploadError::EmptyFile.http_status_code(), 400);
        assert_eq!(
            UploadError::StorageFailure("boom".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn storage_failure_does_not_leak_provider_text() {
        let err = UploadError::StorageFailure("AccessDenied: bucket policy arn:aws:...".into());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("AccessDenied"));
    }

    #[test]
    fn size_message_reports_megabytes() {
        let err = UploadError::SizeExceeded {
            limit: Some(10 * 1024 * 1024),
        };
        assert_eq!(
            err.client_message(),
            "File exceeds maximum allowed size of 10 MB"
        );
    }

    #[test]
    fn small_size_limits_keep_their_unit() {
        let message = |limit| UploadError::SizeExceeded { limit: Some(limit) }.client_message();
        assert_eq!(message(200 * 1024), "File exceeds maximum allowed size of 200 KB");
        assert_eq!(message(1000), "File exceeds maximum allowed size of 1000 bytes");
        assert_eq!(
            message(3 * 1024 * 1024 + 512),
            "File exceeds maximum allowed size of 3146240 bytes"
        );
    }

    #[test]
    fn transport_limit_is_not_reported_as_file_cap() {
        let err = UploadError::SizeExceeded { limit: None };
        assert_eq!(err.client_message(), "Request exceeds maximum allowed size");
        assert!(!err.client_message().contains("MB"));
    }
}
