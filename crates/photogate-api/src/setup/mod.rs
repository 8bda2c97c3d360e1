//! Application setup: storage, services and routes

pub mod routes;
pub mod server;

use anyhow::Result;
use axum::Router;
use photogate_core::Config;
use photogate_ingest::UploadService;
use photogate_storage::create_storage;

use crate::state::AppState;

/// Build the storage backend and upload service, and wire the routes
pub async fn initialize_app(config: &Config) -> Result<Router> {
    tracing::info!("Initializing storage backend...");
    let storage = create_storage(&config.storage).await?;
    tracing::info!(
        backend = %storage.backend_type(),
        bucket = %config.upload.bucket,
        "Storage backend initialized"
    );

    let upload = UploadService::new(storage, config.upload.clone());
    Ok(routes::setup_routes(config, AppState::new(upload)))
}
