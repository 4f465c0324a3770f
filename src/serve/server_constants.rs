/// Static file serving constants
use std::path::Path;
use std::time::SystemTime;

/// Cache-Control for static assets outside debug mode (1 year in seconds)
pub const STATIC_CACHE_MAX_AGE: &str = "public, max-age=31536000, immutable";

/// Cache-Control for static assets in debug mode
pub const STATIC_NO_CACHE: &str = "no-cache";

/// MIME types for static file serving
pub const MIME_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("ico", "image/x-icon"),
    ("svg", "image/svg+xml"),
    ("html", "text/html"),
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

/// Get the MIME type for a file based on its extension.
pub fn get_mime_type(file_path: &Path) -> &'static str {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| MIME_TYPES.iter().find(|(k, _)| *k == ext).map(|(_, v)| *v))
        .unwrap_or("application/octet-stream")
}

/// Generate an ETag from a file's modification time and size.
pub fn generate_etag(modified: SystemTime, len: u64) -> String {
    let secs = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("\"{:x}-{:x}\"", secs, len)
}

/// True when an `If-None-Match` value names `etag`, weak or strong.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| {
            candidate == "*" || candidate == etag || candidate.strip_prefix("W/") == Some(etag)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_mime_types() {
        assert_eq!(get_mime_type(Path::new("content/site.css")), "text/css");
        assert_eq!(get_mime_type(Path::new("LOGO.PNG")), "image/png");
        assert_eq!(get_mime_type(Path::new("archive.tar.gz")), "application/octet-stream");
        assert_eq!(get_mime_type(Path::new("README")), "application/octet-stream");
    }

    #[test]
    fn test_etag() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(255);
        let etag = generate_etag(at, 16);
        assert_eq!(etag, "\"ff-10\"");
        assert!(etag_matches(&etag, &etag));
        assert!(etag_matches(&format!("W/{}", etag), &etag));
        assert!(etag_matches(&format!("\"other\", {}", etag), &etag));
        assert!(etag_matches("*", &etag));
        assert!(!etag_matches("\"other\"", &etag));
    }
}
