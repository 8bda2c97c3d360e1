use std::collections::BTreeMap;

use bytes::BytesMut;
use futures::{Stream, StreamExt};

/// Bounded capture of the scalar (non-file) form fields of one request.
///
/// Values are truncated to `max_chars` characters and at most `max_count` distinct names
/// are kept. A repeated name keeps its first value.
#[derive(Debug, Clone)]
pub struct FormFields {
    values: BTreeMap<String, String>,
    max_chars: usize,
    max_count: usize,
}

impl FormFields {
    pub fn new(max_chars: usize, max_count: usize) -> Self {
        Self {
            values: BTreeMap::new(),
            max_chars,
            max_count,
        }
    }

    /// Whether another distinct field would still be kept
    pub fn has_room(&self) -> bool {
        self.values.len() < self.max_count
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        if self.values.contains_key(name) {
            tracing::debug!(field = %name, "Ignoring repeated form field");
            return;
        }
        if !self.has_room() {
            tracing::debug!(field = %name, max_count = self.max_count, "Form field limit reached");
            return;
        }
        let value: String = value.chars().take(self.max_chars).collect();
        self.values.insert(name.to_string(), value);
    }

    /// Read a scalar field's value without holding more than a bounded prefix in memory.
    ///
    /// At most `max_chars * 4` bytes (the UTF-8 worst case) are kept; the rest of the field
    /// is drained and dropped. Invalid UTF-8 is replaced rather than rejected.
    pub async fn read_value<S, E>(&self, mut field: S) -> Result<String, E>
    where
        S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    {
        let byte_cap = self.max_chars.saturating_mul(4);
        let mut buffer = BytesMut::new();

        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            let room = byte_cap.saturating_sub(buffer.len());
            buffer.extend_from_slice(&chunk[..room.min(chunk.len())]);
        }

        Ok(String::from_utf8_lossy(&buffer)
            .chars()
            .take(self.max_chars)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.values
    }
}
