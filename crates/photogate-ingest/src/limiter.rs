use bytes::Bytes;
use photogate_core::UploadError;

use crate::stage::ByteStage;

/// Pass-through byte counter with a hard ceiling.
pub struct SizeLimiter {
    max_bytes: u64,
    seen: u64,
}

impl SizeLimiter {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes, seen: 0 }
    }

    /// Bytes counted so far; authoritative once the stream has ended.
    pub fn total(&self) -> u64 {
        self.seen
    }
}

impl ByteStage for SizeLimiter {
    fn push(&mut self, chunk: Bytes) -> Result<Option<Bytes>, UploadError> {
        self.seen += chunk.len() as u64;
        if self.seen > self.max_bytes {
            tracing::debug!(
                seen_bytes = self.seen,
                max_bytes = self.max_bytes,
                "Upload exceeded size ceiling"
            );
            return Err(UploadError::SizeExceeded {
                limit: Some(self.max_bytes),
            });
        }
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_forwards() {
        let mut limiter = SizeLimiter::new(10);
        let out = limiter.push(Bytes::from_static(b"12345")).unwrap();
        assert_eq!(out.as_deref(), Some(&b"12345"[..]));
        limiter.push(Bytes::from_static(b"67890")).unwrap();
        assert_eq!(limiter.total(), 10);
    }

    #[test]
    fn fails_on_the_chunk_that_crosses_the_ceiling() {
        let mut limiter = SizeLimiter::new(10);
        limiter.push(Bytes::from_static(b"123456789")).unwrap();
        let err = limiter.push(Bytes::from_static(b"ab")).unwrap_err();
        assert!(matches!(err, UploadError::SizeExceeded { limit: Some(10) }));
    }

    #[test]
    fn empty_stream_totals_zero() {
        let mut limiter = SizeLimiter::new(10);
        assert!(limiter.finish().unwrap().is_none());
        assert_eq!(limiter.total(), 0);
    }
}
