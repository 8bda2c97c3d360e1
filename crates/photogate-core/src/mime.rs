//! Image MIME types recognized by the ingest pipeline.

pub const IMAGE_JPEG: &str = "image/jpeg";
pub const IMAGE_PNG: &str = "image/png";
pub const IMAGE_GIF: &str = "image/gif";
pub const IMAGE_WEBP: &str = "image/webp";
pub const IMAGE_BMP: &str = "image/bmp";
pub const IMAGE_TIFF: &str = "image/tiff";
pub const IMAGE_HEIC: &str = "image/heic";
pub const IMAGE_HEIF: &str = "image/heif";

/// Placeholder clients send when they do not know the type
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Every type the signature table can produce
pub const SUPPORTED_IMAGE_TYPES: [&str; 8] = [
    IMAGE_JPEG, IMAGE_PNG, IMAGE_GIF, IMAGE_WEBP, IMAGE_BMP, IMAGE_TIFF, IMAGE_HEIC, IMAGE_HEIF,
];

/// Normalize MIME type by stripping parameters and case
/// (e.g. "Image/JPEG; charset=utf-8" -> "image/jpeg").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
        .to_lowercase()
}

/// True when the claim carries no information: absent, empty or the generic binary placeholder.
pub fn is_unknown_claim(content_type: &str) -> bool {
    let normalized = normalize_mime_type(content_type);
    normalized.is_empty() || normalized == OCTET_STREAM
}

/// HEIC and HEIF share a container and are interchangeable for matching purposes.
pub fn is_heif_family(content_type: &str) -> bool {
    content_type == IMAGE_HEIC || content_type == IMAGE_HEIF
}

/// Map a supported MIME type back to its static form.
pub fn supported_image_type(content_type: &str) -> Option<&'static str> {
    let normalized = normalize_mime_type(content_type);
    SUPPORTED_IMAGE_TYPES
        .iter()
        .copied()
        .find(|t| *t == normalized)
}
