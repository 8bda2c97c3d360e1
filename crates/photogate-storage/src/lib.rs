//! Photogate Storage Library
//!
//! Object storage abstraction with S3, local filesystem and in-memory backends.
//!
//! # Object keys
//!
//! Keys are bucket-relative and `/`-separated. Generated keys take the form
//! `{prefix}/{filename}`; thumbnails are stored at `{dir}/thumbnails/{filename}` beside
//! their parent object. Keys must not contain `..` segments or a leading `/`. Key
//! handling is centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::{MemoryObject, MemoryStorage};
pub use photogate_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, ObjectStorage, PutOptions, StorageError, StorageResult, StoredObject};
