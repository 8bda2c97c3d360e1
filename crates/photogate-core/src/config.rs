//! Configuration module
//!
//! Server, storage backend and upload pipeline settings, loaded from the environment
//! (with `.env` support) and falling back to defaults for anything unset.

use std::env;
use std::str::FromStr;

use crate::mime::{supported_image_type, SUPPORTED_IMAGE_TYPES};
use crate::storage_types::StorageBackend;

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_FIELD_NAME: &str = "photo";
pub const DEFAULT_THUMBNAIL_FIELD_NAME: &str = "thumbnail";
pub const DEFAULT_BUCKET: &str = "photos";
pub const DEFAULT_PATH_PREFIX: &str = "uploads";
pub const DEFAULT_CACHE_CONTROL: &str = "3600";
pub const DEFAULT_PEEK_BYTES: usize = 64;
pub const DEFAULT_THUMBNAIL_MAX_BYTES: usize = 200 * 1024;
pub const DEFAULT_FIELD_VALUE_MAX_CHARS: usize = 256;
pub const DEFAULT_FIELD_MAX_COUNT: usize = 32;
pub const DEFAULT_MAX_FILES: usize = 2;
pub const DEFAULT_SINK_BUFFER_CHUNKS: usize = 16;

const DEFAULT_PORT: u16 = 4000;

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
}

/// Where validated bytes end up
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, ...)
    pub local_storage_path: Option<String>,
}

/// Per-upload pipeline settings
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Hard ceiling on the primary file, in bytes
    pub max_bytes: u64,
    /// Multipart field carrying the primary file
    pub field_name: String,
    pub thumbnail_field_name: String,
    pub bucket: String,
    /// Prefix under which generated object paths are placed
    pub path_prefix: String,
    /// Replace an existing object at the same path instead of failing
    pub allow_overwrite: bool,
    pub cache_control: Option<String>,
    /// Bytes inspected by the signature sniffer before anything is forwarded
    pub peek_bytes: usize,
    pub thumbnail_max_bytes: usize,
    pub field_value_max_chars: usize,
    pub field_max_count: usize,
    /// File parts allowed per request (primary plus thumbnail)
    pub max_files: usize,
    /// Chunks buffered between the pipeline and the storage client
    pub sink_buffer_chunks: usize,
    pub allowed_types: Vec<&'static str>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            field_name: DEFAULT_FIELD_NAME.to_string(),
            thumbnail_field_name: DEFAULT_THUMBNAIL_FIELD_NAME.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            allow_overwrite: false,
            cache_control: Some(DEFAULT_CACHE_CONTROL.to_string()),
            peek_bytes: DEFAULT_PEEK_BYTES,
            thumbnail_max_bytes: DEFAULT_THUMBNAIL_MAX_BYTES,
            field_value_max_chars: DEFAULT_FIELD_VALUE_MAX_CHARS,
            field_max_count: DEFAULT_FIELD_MAX_COUNT,
            max_files: DEFAULT_MAX_FILES,
            sink_buffer_chunks: DEFAULT_SINK_BUFFER_CHUNKS,
            allowed_types: SUPPORTED_IMAGE_TYPES.to_vec(),
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();

        let allowed_types = match env::var("ALLOWED_IMAGE_TYPES") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    supported_image_type(s).ok_or_else(|| {
                        anyhow::anyhow!(
                            "ALLOWED_IMAGE_TYPES contains unsupported type '{}' (supported: {})",
                            s,
                            SUPPORTED_IMAGE_TYPES.join(", ")
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => defaults.allowed_types,
        };

        let cache_control = match env::var("UPLOAD_CACHE_CONTROL") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => defaults.cache_control,
        };

        Ok(Self {
            max_bytes: env_or("UPLOAD_MAX_BYTES", defaults.max_bytes),
            field_name: env::var("UPLOAD_FIELD_NAME").unwrap_or(defaults.field_name),
            thumbnail_field_name: env::var("UPLOAD_THUMBNAIL_FIELD_NAME")
                .unwrap_or(defaults.thumbnail_field_name),
            bucket: env::var("STORAGE_BUCKET").unwrap_or(defaults.bucket),
            path_prefix: env::var("UPLOAD_PATH_PREFIX").unwrap_or(defaults.path_prefix),
            allow_overwrite: env_or("UPLOAD_ALLOW_OVERWRITE", defaults.allow_overwrite),
            cache_control,
            peek_bytes: env_or("UPLOAD_PEEK_BYTES", defaults.peek_bytes),
            thumbnail_max_bytes: env_or("THUMBNAIL_MAX_BYTES", defaults.thumbnail_max_bytes),
            field_value_max_chars: env_or("FORM_FIELD_MAX_CHARS", defaults.field_value_max_chars),
            field_max_count: env_or("FORM_FIELD_MAX_COUNT", defaults.field_max_count),
            max_files: env_or("UPLOAD_MAX_FILES", defaults.max_files),
            sink_buffer_chunks: env_or("UPLOAD_SINK_BUFFER_CHUNKS", defaults.sink_buffer_chunks),
            allowed_types,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_bytes == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_BYTES must be greater than zero"));
        }
        // The HEIC/HEIF brand sits at offset 8..12, so a smaller window can never see it
        if self.peek_bytes < 12 {
            return Err(anyhow::anyhow!("UPLOAD_PEEK_BYTES must be at least 12"));
        }
        if self.field_name.trim().is_empty() {
            return Err(anyhow::anyhow!("UPLOAD_FIELD_NAME must not be empty"));
        }
        if self.field_name == self.thumbnail_field_name {
            return Err(anyhow::anyhow!(
                "UPLOAD_FIELD_NAME and UPLOAD_THUMBNAIL_FIELD_NAME must differ"
            ));
        }
        if self.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_BUCKET must not be empty"));
        }
        if self.max_files == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_FILES must be at least 1"));
        }
        if self.sink_buffer_chunks == 0 {
            return Err(anyhow::anyhow!("UPLOAD_SINK_BUFFER_CHUNKS must be at least 1"));
        }
        if self.allowed_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_IMAGE_TYPES must not be empty"));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server = ServerConfig {
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
        };

        let backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::S3,
        };

        let storage = StorageConfig {
            backend,
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
        };

        Ok(Config {
            server,
            storage,
            upload: UploadConfig::from_env()?,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        self.upload.validate()
    }
}

fn env_or<T: FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}
