//! Upload route integration tests.
//!
//! Run with: `cargo test -p photogate-api --test upload_test`

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use photogate_api::handlers::upload_photo;
use photogate_api::setup::routes::setup_routes;
use photogate_api::AppState;
use photogate_core::{Config, ServerConfig, StorageBackend, StorageConfig, UploadConfig};
use photogate_ingest::UploadService;
use photogate_storage::{LocalStorage, MemoryStorage, ObjectStorage};

const MIB: usize = 1024 * 1024;

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            port: 0,
            environment: "test".to_string(),
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
        },
        upload: UploadConfig::default(),
    }
}

fn server_with(storage: Arc<dyn ObjectStorage>) -> TestServer {
    let config = test_config();
    let state = AppState::new(UploadService::new(storage, config.upload.clone()));
    let app = setup_routes(&config, state);
    TestServer::new(app.into_make_service()).expect("Failed to create test server")
}

fn jpeg(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    data.resize(len, 0x7E);
    data
}

fn photo(data: Vec<u8>, filename: &'static str, mime_type: &'static str) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from(data))
        .file_name(filename)
        .mime_type(mime_type);
    MultipartForm::new().add_part("photo", part)
}

#[tokio::test]
async fn test_upload_photo() {
    let storage = MemoryStorage::new();
    let server = server_with(Arc::new(storage.clone()));

    let form = photo(jpeg(2048), "holiday.jpg", "image/jpeg").add_text("album", "summer");
    let response = server.post("/photos").multipart(form).await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["mimeType"], "image/jpeg");
    assert_eq!(body["originalFilename"], "holiday.jpg");
    assert_eq!(body["size"], 2048);
    assert_eq!(body["bucket"], "photos");
    assert_eq!(body["fields"]["album"], "summer");
    assert!(body.get("thumbnailPath").is_none());

    let path = body["path"].as_str().expect("Expected 'path' in upload response");
    assert_eq!(storage.get("photos", path).unwrap().data.len(), 2048);
}

#[tokio::test]
async fn test_fake_image_is_unsupported_media_type() {
    let storage = MemoryStorage::new();
    let server = server_with(Arc::new(storage.clone()));

    let response = server
        .post("/photos")
        .multipart(photo(b"not an image".to_vec(), "x.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), 415);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_FILE_SIGNATURE");
    assert_eq!(body["recoverable"], false);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_oversize_upload_is_payload_too_large() {
    let storage = MemoryStorage::new();
    let server = server_with(Arc::new(storage.clone()));

    let response = server
        .post("/photos")
        .multipart(photo(jpeg(11 * MIB), "big.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), 413);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SIZE_EXCEEDED");
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_request_body_limit_is_payload_too_large() {
    let storage = MemoryStorage::new();
    let config = test_config();
    let state = AppState::new(UploadService::new(
        Arc::new(storage.clone()),
        config.upload.clone(),
    ));
    let app = Router::new()
        .route("/photos", post(upload_photo))
        .with_state(state)
        .layer(DefaultBodyLimit::max(4096));
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    let response = server
        .post("/photos")
        .multipart(photo(jpeg(64 * 1024), "mid.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), 413);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SIZE_EXCEEDED");
    assert_eq!(body["error"], "Request exceeds maximum allowed size");
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_empty_file_is_bad_request() {
    let storage = MemoryStorage::new();
    let server = server_with(Arc::new(storage.clone()));

    let response = server
        .post("/photos")
        .multipart(photo(Vec::new(), "empty.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "EMPTY_FILE");
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_json_body_has_no_file() {
    let server = server_with(Arc::new(MemoryStorage::new()));

    let response = server
        .post("/photos")
        .json(&serde_json::json!({ "photo": "base64..." }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "NO_FILE_PRESENT");
}

#[tokio::test]
async fn test_owner_header_scopes_hash() {
    let server = server_with(Arc::new(MemoryStorage::new()));
    let data = jpeg(1024);

    let mut hashes = Vec::new();
    for owner in ["user-1", "user-1", "user-2"] {
        let response = server
            .post("/photos")
            .add_header("x-owner-token", owner)
            .multipart(photo(data.clone(), "a.jpg", "image/jpeg"))
            .await;
        assert_eq!(response.status_code(), 200);
        let body: serde_json::Value = response.json();
        hashes.push(body["hash"].as_str().unwrap().to_string());
    }

    assert_eq!(hashes[0], hashes[1]);
    assert_ne!(hashes[0], hashes[2]);
}

#[tokio::test]
async fn test_storage_failure_hides_details() {
    let storage = MemoryStorage::new();
    storage.fail_uploads(true);
    let server = server_with(Arc::new(storage.clone()));

    let response = server
        .post("/photos")
        .multipart(photo(jpeg(4096), "a.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), 500);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "STORAGE_ERROR");
    assert_eq!(body["recoverable"], true);
    assert!(body.get("details").is_none());
    assert!(!response.text().contains("connection reset"));
}

#[tokio::test]
async fn test_local_backend_writes_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path()).await.unwrap();
    let server = server_with(Arc::new(storage));
    let data = jpeg(3000);

    let response = server
        .post("/photos")
        .multipart(photo(data.clone(), "disk.jpg", "image/jpeg"))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    let path = body["path"].as_str().unwrap();
    let on_disk = std::fs::read(dir.path().join("photos").join(path)).unwrap();
    assert_eq!(on_disk, data);
}

#[tokio::test]
async fn test_health() {
    let server = server_with(Arc::new(MemoryStorage::new()));
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
}
