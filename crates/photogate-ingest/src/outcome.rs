use std::collections::BTreeMap;

use serde::Serialize;

/// Successful ingest of one primary file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    /// Generated storage-safe filename
    pub filename: String,
    pub original_filename: String,
    /// Detected from content, never the client claim
    pub mime_type: String,
    /// Hex SHA-256, owner-scoped when an owner token was given
    pub hash: String,
    pub path: String,
    pub bucket: String,
    pub size: u64,
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let outcome = UploadOutcome {
            filename: "0000-cat.jpg".to_string(),
            original_filename: "cat.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            hash: "ab".to_string(),
            path: "uploads/0000-cat.jpg".to_string(),
            bucket: "photos".to_string(),
            size: 12,
            fields: BTreeMap::from([("album".to_string(), "summer".to_string())]),
            thumbnail_path: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["originalFilename"], "cat.jpg");
        assert_eq!(json["mimeType"], "image/jpeg");
        assert_eq!(json["fields"]["album"], "summer");
        assert!(json.get("thumbnailPath").is_none());
    }
}
