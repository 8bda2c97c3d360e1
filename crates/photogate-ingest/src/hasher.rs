use bytes::Bytes;
use photogate_core::UploadError;
use sha2::{Digest, Sha256};

use crate::stage::ByteStage;

/// SHA-256 over every byte that passes through, optionally scoped to an owner.
///
/// The owner token is folded in only after all content, so equal bytes from the same
/// owner always hash equal and equal bytes from different owners never do.
pub struct ContentHasher {
    hasher: Sha256,
    owner_token: Option<String>,
}

impl ContentHasher {
    pub fn new(owner_token: Option<String>) -> Self {
        Self {
            hasher: Sha256::new(),
            owner_token,
        }
    }

    /// Hex digest. Consumes the hasher, so it can only be read once the stream is drained.
    pub fn finalize(mut self) -> String {
        if let Some(owner) = self.owner_token.take() {
            self.hasher.update(owner.as_bytes());
            // Length suffix keeps content/owner boundaries unambiguous
            self.hasher.update((owner.len() as u64).to_be_bytes());
        }
        hex::encode(self.hasher.finalize())
    }
}

impl ByteStage for ContentHasher {
    fn push(&mut self, chunk: Bytes) -> Result<Option<Bytes>, UploadError> {
        self.hasher.update(&chunk);
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(owner: Option<&str>, parts: &[&'static [u8]]) -> String {
        let mut hasher = ContentHasher::new(owner.map(String::from));
        for part in parts {
            hasher.push(Bytes::from_static(part)).unwrap();
        }
        hasher.finalize()
    }

    #[test]
    fn unscoped_digest_is_plain_sha256() {
        assert_eq!(
            hash(None, &[b"abc"]),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chunking_does_not_change_the_digest() {
        assert_eq!(hash(None, &[b"a", b"b", b"c"]), hash(None, &[b"abc"]));
    }

    #[test]
    fn same_owner_is_stable() {
        assert_eq!(
            hash(Some("user-1"), &[b"photo bytes"]),
            hash(Some("user-1"), &[b"photo", b" bytes"])
        );
    }

    #[test]
    fn different_owners_differ() {
        let a = hash(Some("user-1"), &[b"photo bytes"]);
        let b = hash(Some("user-2"), &[b"photo bytes"]);
        assert_ne!(a, b);
        assert_ne!(a, hash(None, &[b"photo bytes"]));
    }

    #[test]
    fn owner_boundary_is_unambiguous() {
        assert_ne!(hash(Some("c"), &[b"ab"]), hash(Some("bc"), &[b"a"]));
    }
}
