use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;
use photogate_storage::{ByteStream, StorageError};

/// Producer half of the bounded pass-through buffer between the pipeline and the storage
/// client. The consumer half is handed to the backend as its live body.
pub struct StorageSink {
    tx: mpsc::Sender<Result<Bytes, StorageError>>,
    forwarded: u64,
}

/// Create a sink that lets `buffer_chunks` chunks queue up before `send` starts waiting
/// for the consumer.
pub fn storage_sink(buffer_chunks: usize) -> (StorageSink, ByteStream) {
    let (tx, rx) = mpsc::channel(buffer_chunks);
    (StorageSink { tx, forwarded: 0 }, Box::pin(rx))
}

impl StorageSink {
    /// Waits while the buffer is full. Returns `false` once the consumer has gone away.
    pub async fn send(&mut self, chunk: Bytes) -> bool {
        let len = chunk.len() as u64;
        if self.tx.send(Ok(chunk)).await.is_err() {
            return false;
        }
        self.forwarded += len;
        true
    }

    /// Tell the consumer the producer failed, so the object is abandoned rather than committed.
    pub async fn abort(mut self, reason: &str) {
        if self
            .tx
            .send(Err(StorageError::Aborted(reason.to_string())))
            .await
            .is_err()
        {
            tracing::debug!(reason = %reason, "Storage stream already closed before abort");
        }
        self.tx.close_channel();
    }

    /// End of stream; the backend may commit the object.
    pub fn close(mut self) {
        self.tx.close_channel();
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }
}
