//! Photogate Core Library
//!
//! Error taxonomy, configuration and MIME constants shared by the storage,
//! ingest and API crates.

pub mod config;
pub mod error;
pub mod mime;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, ServerConfig, StorageConfig, UploadConfig};
pub use error::{ErrorMetadata, LogLevel, UploadError};
pub use storage_types::StorageBackend;
