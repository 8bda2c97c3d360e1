//! Photogate API Library
//!
//! HTTP surface for the ingest pipeline: one upload route, JSON error rendering and
//! application setup.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

// Re-exports
pub use error::{ErrorResponse, HttpUploadError};
pub use state::AppState;
