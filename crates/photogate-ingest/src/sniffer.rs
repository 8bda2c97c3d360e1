//! Magic-byte signature sniffing
//!
//! The sniffer holds back the first `peek_bytes` of a stream, decides what the bytes
//! really are, and only then lets anything through. Unrecognized content is rejected.

use bytes::{Bytes, BytesMut};
use photogate_core::mime::{
    is_heif_family, is_unknown_claim, normalize_mime_type, supported_image_type, IMAGE_BMP,
    IMAGE_GIF, IMAGE_HEIC, IMAGE_HEIF, IMAGE_JPEG, IMAGE_PNG, IMAGE_TIFF, IMAGE_WEBP,
    OCTET_STREAM,
};
use photogate_core::UploadError;
use tokio::sync::oneshot;

use crate::stage::ByteStage;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const HEIC_BRANDS: [&[u8; 4]; 8] = [
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"hevm", b"hevs",
];
const HEIF_BRANDS: [&[u8; 4]; 3] = [b"heif", b"mif1", b"msf1"];

/// Detect the image type of `data` from its leading bytes.
pub fn detect_image_type(data: &[u8]) -> Option<&'static str> {
    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(IMAGE_JPEG);
    }

    if data.starts_with(&PNG_SIGNATURE) {
        return Some(IMAGE_PNG);
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some(IMAGE_GIF);
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some(IMAGE_WEBP);
    }

    if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        return Some(IMAGE_TIFF);
    }

    // ISO-BMFF: ftyp box at offset 4, major brand at offset 8
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        let brand = &data[8..12];
        if HEIC_BRANDS.iter().any(|b| &b[..] == brand) {
            return Some(IMAGE_HEIC);
        }
        if HEIF_BRANDS.iter().any(|b| &b[..] == brand) {
            return Some(IMAGE_HEIF);
        }
    }

    if data.starts_with(b"BM") {
        return Some(IMAGE_BMP);
    }

    None
}

/// Result of sniffing one upload, produced exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Type derived from content only
    pub mime_type: &'static str,
    /// Whether the client's claim named this type (or its HEIC/HEIF sibling)
    pub claim_matched: bool,
}

enum SniffState {
    Peeking,
    Passing,
    Rejected,
}

pub struct SignatureSniffer {
    peek_bytes: usize,
    claimed: String,
    allowed: Vec<&'static str>,
    buffer: BytesMut,
    state: SniffState,
    notify: Option<oneshot::Sender<Classification>>,
}

impl SignatureSniffer {
    /// Build a sniffer and the one-shot receiver that resolves when the stream has been
    /// classified. The receiver errors if the stream is rejected or abandoned first.
    pub fn new(
        claimed: &str,
        allowed: &[&'static str],
        peek_bytes: usize,
    ) -> (Self, oneshot::Receiver<Classification>) {
        let (tx, rx) = oneshot::channel();
        let sniffer = Self {
            peek_bytes,
            claimed: normalize_mime_type(claimed),
            allowed: allowed.to_vec(),
            buffer: BytesMut::with_capacity(peek_bytes),
            state: SniffState::Peeking,
            notify: Some(tx),
        };
        (sniffer, rx)
    }

    fn is_allowed(&self, mime_type: &str) -> bool {
        self.allowed.iter().any(|t| *t == mime_type)
    }

    fn decide(&self, detected: Option<&'static str>) -> Result<Classification, UploadError> {
        let unknown_claim = is_unknown_claim(&self.claimed);

        // Nothing to inspect: let the orchestrator report the emptiness itself.
        if self.buffer.is_empty() {
            let fallback = supported_image_type(&self.claimed)
                .filter(|t| self.is_allowed(t))
                .unwrap_or(OCTET_STREAM);
            return Ok(Classification {
                mime_type: fallback,
                claim_matched: !unknown_claim && fallback != OCTET_STREAM,
            });
        }

        let rejected = || UploadError::InvalidSignature {
            claimed: self.claimed.clone(),
            detected,
        };

        let mime_type = match detected {
            Some(t) if self.is_allowed(t) => t,
            _ => return Err(rejected()),
        };

        if unknown_claim {
            return Ok(Classification {
                mime_type,
                claim_matched: false,
            });
        }

        if mime_type == self.claimed || (is_heif_family(mime_type) && is_heif_family(&self.claimed))
        {
            return Ok(Classification {
                mime_type,
                claim_matched: true,
            });
        }

        Err(rejected())
    }

    fn classify(&mut self) -> Result<Option<Bytes>, UploadError> {
        let detected = detect_image_type(&self.buffer);

        match self.decide(detected) {
            Ok(classification) => {
                self.state = SniffState::Passing;
                tracing::debug!(
                    claimed = %self.claimed,
                    detected = classification.mime_type,
                    claim_matched = classification.claim_matched,
                    peeked_bytes = self.buffer.len(),
                    "Upload classified"
                );
                if let Some(notify) = self.notify.take() {
                    // The receiver may already be gone if the session was torn down.
                    let _ = notify.send(classification);
                }
                if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(self.buffer.split().freeze()))
                }
            }
            Err(err) => {
                self.state = SniffState::Rejected;
                self.notify = None;
                tracing::warn!(
                    claimed = %self.claimed,
                    detected = ?detected,
                    "Rejected upload with unrecognized signature, first 8 bytes: {:02X?}",
                    &self.buffer[..8.min(self.buffer.len())]
                );
                self.buffer.clear();
                Err(err)
            }
        }
    }

    fn rejection(&self) -> UploadError {
        UploadError::InvalidSignature {
            claimed: self.claimed.clone(),
            detected: None,
        }
    }
}

impl ByteStage for SignatureSniffer {
    fn push(&mut self, chunk: Bytes) -> Result<Option<Bytes>, UploadError> {
        match self.state {
            SniffState::Passing => Ok(Some(chunk)),
            SniffState::Rejected => Err(self.rejection()),
            SniffState::Peeking => {
                self.buffer.extend_from_slice(&chunk);
                if self.buffer.len() >= self.peek_bytes {
                    self.classify()
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn finish(&mut self) -> Result<Option<Bytes>, UploadError> {
        match self.state {
            SniffState::Passing => Ok(None),
            SniffState::Rejected => Err(self.rejection()),
            SniffState::Peeking => self.classify(),
        }
    }
}
