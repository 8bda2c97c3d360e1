//! Byte-stream transform stages
//!
//! Each stage sees chunks strictly in arrival order and either forwards bytes, holds them
//! back, or fails the whole pipeline. Stages are composed by value with [`ByteStage::then`];
//! the finished chain is destructured afterwards to read per-stage results.

use bytes::{Bytes, BytesMut};
use photogate_core::UploadError;

pub trait ByteStage: Send {
    /// Process one chunk. `Ok(None)` means nothing is ready to forward yet.
    fn push(&mut self, chunk: Bytes) -> Result<Option<Bytes>, UploadError>;

    /// The source has ended; flush anything held back.
    fn finish(&mut self) -> Result<Option<Bytes>, UploadError> {
        Ok(None)
    }

    /// Feed this stage's output into `next`.
    fn then<N: ByteStage>(self, next: N) -> Chain<Self, N>
    where
        Self: Sized,
    {
        Chain {
            first: self,
            second: next,
        }
    }
}

/// Two stages connected in series
pub struct Chain<A, B> {
    pub first: A,
    pub second: B,
}

impl<A: ByteStage, B: ByteStage> ByteStage for Chain<A, B> {
    fn push(&mut self, chunk: Bytes) -> Result<Option<Bytes>, UploadError> {
        match self.first.push(chunk)? {
            Some(bytes) => self.second.push(bytes),
            None => Ok(None),
        }
    }

    fn finish(&mut self) -> Result<Option<Bytes>, UploadError> {
        let flushed = match self.first.finish()? {
            Some(bytes) => self.second.push(bytes)?,
            None => None,
        };

        match (flushed, self.second.finish()?) {
            (Some(head), Some(tail)) => {
                let mut joined = BytesMut::with_capacity(head.len() + tail.len());
                joined.extend_from_slice(&head);
                joined.extend_from_slice(&tail);
                Ok(Some(joined.freeze()))
            }
            (head, tail) => Ok(head.or(tail)),
        }
    }
}
