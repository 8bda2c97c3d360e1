use uuid::Uuid;

const MAX_FILENAME_LENGTH: usize = 255;
const FALLBACK_FILENAME: &str = "file";

/// Reduce an untrusted client filename to something safe to embed in an object key.
///
/// Directory components are stripped (both `/` and `\` separators) and every character
/// outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '.') {
        return FALLBACK_FILENAME.to_string();
    }

    sanitized
}

/// `{uuid-v4}-{sanitized original}`
pub fn generate_storage_filename(original: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_filename(original))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_safe_names() {
        assert_eq!(sanitize_filename("image.png"), "image.png");
        assert_eq!(sanitize_filename("my-file_1.jpg"), "my-file_1.jpg");
    }

    #[test]
    fn strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cat.jpg"), "cat.jpg");
    }

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_filename("café.jpg"), "caf_.jpg");
    }

    #[test]
    fn empty_or_dot_names_fall_back() {
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename(".."), "file");
        assert_eq!(sanitize_filename("dir/"), "file");
    }

    #[test]
    fn caps_length() {
        let long = "a".repeat(1000);
        assert_eq!(sanitize_filename(&long).len(), 255);
    }

    #[test]
    fn generated_name_is_unique_and_prefixed() {
        let a = generate_storage_filename("cat.jpg");
        let b = generate_storage_filename("cat.jpg");
        assert_ne!(a, b);
        assert!(a.ends_with("-cat.jpg"));
        assert!(Uuid::parse_str(&a[..36]).is_ok());
    }
}
