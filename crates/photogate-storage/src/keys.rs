//! Shared object key handling for storage backends.
//!
//! Key format: `{prefix}/{filename}` with empty segments dropped, or a caller-supplied
//! override path. Thumbnails live beside their parent in a `thumbnails/` directory.

use crate::traits::{StorageError, StorageResult};

const THUMBNAIL_DIR: &str = "thumbnails";

/// Reject keys that could escape a bucket or address nothing.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Join a prefix and a filename into an object key.
pub fn generate_storage_key(prefix: &str, filename: &str) -> String {
    prefix
        .split('/')
        .chain(std::iter::once(filename))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Key for the thumbnail belonging to `key`: `a/b/c.jpg` -> `a/b/thumbnails/c.jpg`.
pub fn thumbnail_key(key: &str) -> String {
    match key.rsplit_once('/') {
        Some((dir, name)) => format!("{}/{}/{}", dir, THUMBNAIL_DIR, name),
        None => format!("{}/{}", THUMBNAIL_DIR, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_prefix_and_filename() {
        assert_eq!(generate_storage_key("uploads", "a.jpg"), "uploads/a.jpg");
        assert_eq!(generate_storage_key("/uploads/2024/", "a.jpg"), "uploads/2024/a.jpg");
        assert_eq!(generate_storage_key("", "a.jpg"), "a.jpg");
    }

    #[test]
    fn thumbnail_sits_beside_parent() {
        assert_eq!(thumbnail_key("uploads/a.jpg"), "uploads/thumbnails/a.jpg");
        assert_eq!(thumbnail_key("a.jpg"), "thumbnails/a.jpg");
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/../../b").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("uploads/..hidden.jpg").is_ok());
        assert!(validate_key("uploads/a.jpg").is_ok());
    }
}
