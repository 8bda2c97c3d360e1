//! Application state shared by handlers

use std::sync::Arc;

use photogate_ingest::UploadService;

#[derive(Clone)]
pub struct AppState {
    pub upload: Arc<UploadService>,
}

impl AppState {
    pub fn new(upload: UploadService) -> Self {
        Self {
            upload: Arc::new(upload),
        }
    }
}
