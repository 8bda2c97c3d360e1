//! Upload handler

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::Json;
use photogate_ingest::{UploadOutcome, UploadRequest};

use crate::error::HttpUploadError;
use crate::state::AppState;

/// Scopes the content hash to an owner; normally set by an authenticating proxy
pub const OWNER_TOKEN_HEADER: &str = "x-owner-token";
/// Explicit object path for the upload
pub const UPLOAD_PATH_HEADER: &str = "x-upload-path";

/// `POST /photos`
pub async fn upload_photo(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<UploadOutcome>, HttpUploadError> {
    let options = upload_options(request.headers());
    let outcome = state.upload.ingest(request, options).await?;
    Ok(Json(outcome))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn upload_options(headers: &HeaderMap) -> UploadRequest {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    };

    UploadRequest {
        owner_token: header(OWNER_TOKEN_HEADER),
        path_override: header(UPLOAD_PATH_HEADER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_options_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_TOKEN_HEADER, HeaderValue::from_static("user-1"));
        headers.insert(UPLOAD_PATH_HEADER, HeaderValue::from_static("  "));

        let options = upload_options(&headers);
        assert_eq!(options.owner_token.as_deref(), Some("user-1"));
        assert!(options.path_override.is_none());
    }
}
