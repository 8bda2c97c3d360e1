//! Route configuration

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use photogate_core::{Config, UploadConfig};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, upload_photo};
use crate::state::AppState;

/// Headroom for multipart framing and small parts on top of the file caps
const BODY_LIMIT_SLACK_BYTES: usize = 1024 * 1024;

pub fn setup_routes(config: &Config, state: AppState) -> Router {
    let body_limit = request_body_limit(&config.upload);
    tracing::info!(body_limit_bytes = body_limit, "Request body limit configured");

    Router::new()
        .route("/photos", post(upload_photo))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Whole-request ceiling. Sits above the primary file cap so oversize files are reported
/// by the pipeline's own limiter.
pub fn request_body_limit(upload: &UploadConfig) -> usize {
    let fields = upload
        .field_max_count
        .saturating_mul(upload.field_value_max_chars)
        .saturating_mul(4);

    usize::try_from(upload.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(upload.thumbnail_max_bytes)
        .saturating_add(fields)
        .saturating_add(BODY_LIMIT_SLACK_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_exceeds_file_cap() {
        let upload = UploadConfig::default();
        assert!(request_body_limit(&upload) > upload.max_bytes as usize + upload.thumbnail_max_bytes);
    }
}
