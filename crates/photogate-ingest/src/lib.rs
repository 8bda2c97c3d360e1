//! Photogate Ingest Library
//!
//! Streaming validation of uploaded images. Each primary file flows through a chain of
//! byte stages before it reaches object storage:
//!
//! ```text
//! multipart field -> SignatureSniffer -> SizeLimiter -> ContentHasher -> StorageSink -> ObjectStorage
//! ```
//!
//! The storage transfer only starts once the sniffer has classified the content, so the
//! object is written with the detected type and rejected uploads never reach storage.
//! [`UploadService`] drives the whole request, including the thumbnail side-channel and
//! scalar form fields.

pub mod fields;
pub mod filename;
pub mod hasher;
pub mod limiter;
pub mod outcome;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod sink;
pub mod sniffer;
pub mod stage;
pub mod thumbnail;

// Re-export commonly used types
pub use fields::FormFields;
pub use filename::{generate_storage_filename, sanitize_filename};
pub use hasher::ContentHasher;
pub use limiter::SizeLimiter;
pub use outcome::UploadOutcome;
pub use pipeline::{run_pipeline, PipelineReport, PipelineSettings};
pub use service::UploadService;
pub use session::{UploadRequest, UploadSession};
pub use sink::{storage_sink, StorageSink};
pub use sniffer::{detect_image_type, Classification, SignatureSniffer};
pub use stage::{ByteStage, Chain};
pub use thumbnail::{Thumbnail, ThumbnailBuffer};
