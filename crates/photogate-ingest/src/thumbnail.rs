//! Thumbnail side-channel
//!
//! An optional small image sent alongside the primary file. It is buffered whole in memory
//! under a strict cap and never enters the streaming pipeline.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::sniffer::detect_image_type;

/// A buffered thumbnail whose content type was derived from its bytes
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub data: Bytes,
    pub mime_type: &'static str,
}

pub struct ThumbnailBuffer {
    max_bytes: usize,
    data: BytesMut,
    overflowed: bool,
}

impl ThumbnailBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            data: BytesMut::new(),
            overflowed: false,
        }
    }

    /// Append a chunk. Crossing the cap drops everything buffered so far and every later chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.data.len() + chunk.len() > self.max_bytes {
            self.overflowed = true;
            self.data = BytesMut::new();
            return;
        }
        self.data.extend_from_slice(chunk);
    }

    pub fn is_discarded(&self) -> bool {
        self.overflowed
    }

    /// Drain `field` into the buffer. A source error discards the thumbnail.
    pub async fn fill<S, E>(&mut self, mut field: S)
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(chunk) => self.push(&chunk),
                Err(e) => {
                    tracing::warn!(error = %e, "Thumbnail field failed, discarding thumbnail");
                    self.overflowed = true;
                    self.data = BytesMut::new();
                    return;
                }
            }
        }
        if self.overflowed {
            tracing::debug!(max_bytes = self.max_bytes, "Thumbnail exceeded cap, discarded");
        }
    }

    /// Classify the buffered bytes. `None` when the thumbnail was discarded, is empty, or
    /// is not one of the `allowed` image types.
    pub fn finish(self, allowed: &[&'static str]) -> Option<Thumbnail> {
        if self.overflowed || self.data.is_empty() {
            return None;
        }

        match detect_image_type(&self.data) {
            Some(mime_type) if allowed.contains(&mime_type) => Some(Thumbnail {
                data: self.data.freeze(),
                mime_type,
            }),
            detected => {
                tracing::warn!(
                    detected = ?detected,
                    size_bytes = self.data.len(),
                    "Discarding thumbnail with unrecognized or disallowed signature"
                );
                None
            }
        }
    }
}
