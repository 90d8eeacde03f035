//! Save-path generation and Content-Type to extension mapping.

use std::path::{Path, PathBuf};

use rand::Rng;

/// Generates a unique file id: `YYYYmmddHHMMSS` followed by 8 hex digits.
#[must_use]
pub fn unique_file_id() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("{timestamp}{suffix:08x}")
}

/// Returns the extensionless working path for a new fetch in `dir`.
#[must_use]
pub fn base_save_path(dir: &Path) -> PathBuf {
    dir.join(unique_file_id())
}

/// Appends an extension (including its dot) to a path without touching
/// any dots already present in the file name.
#[must_use]
pub fn with_extension_appended(path: &Path, extension: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(extension);
    PathBuf::from(raw)
}

/// Guess file extension from a Content-Type header value.
///
/// Parameters (`; charset=...`) are ignored and matching is
/// case-insensitive. Unmapped types yield `None`.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let extension = match mime.as_str() {
        // Video
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/quicktime" => ".mov",
        "video/x-msvideo" => ".avi",
        "video/x-matroska" => ".mkv",
        "video/mpeg" => ".mpeg",
        "video/x-flv" => ".flv",
        "video/mp2t" => ".ts",
        // Audio
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/mp4" | "audio/x-m4a" => ".m4a",
        "audio/aac" => ".aac",
        "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
        "audio/ogg" => ".ogg",
        "audio/flac" | "audio/x-flac" => ".flac",
        "audio/webm" => ".weba",
        // Images
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "image/svg+xml" => ".svg",
        "image/tiff" => ".tiff",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        // Documents and text
        "text/html" => ".html",
        "text/plain" => ".txt",
        "text/css" => ".css",
        "text/csv" => ".csv",
        "text/javascript" | "application/javascript" => ".js",
        "application/json" => ".json",
        "application/xml" | "text/xml" => ".xml",
        "application/pdf" => ".pdf",
        // Archives
        "application/zip" => ".zip",
        "application/gzip" => ".gz",
        // Fonts
        "font/ttf" => ".ttf",
        "font/otf" => ".otf",
        "font/woff" => ".woff",
        "font/woff2" => ".woff2",
        _ => return None,
    };
    Some(extension)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_file_id_shape() {
        let id = unique_file_id();
        assert_eq!(id.len(), 22, "unexpected id: {id}");
        assert!(id[..14].chars().all(|c| c.is_ascii_digit()), "id: {id}");
        assert!(id[14..].chars().all(|c| c.is_ascii_hexdigit()), "id: {id}");
    }

    #[test]
    fn test_unique_file_id_differs_between_calls() {
        assert_ne!(unique_file_id(), unique_file_id());
    }

    #[test]
    fn test_base_save_path_is_inside_dir() {
        let path = base_save_path(Path::new("/tmp/media"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/media")));
        assert_eq!(path.extension(), None);
    }

    #[test]
    fn test_with_extension_appended_keeps_existing_dots() {
        let path = with_extension_appended(Path::new("/tmp/a.b"), ".mp4");
        assert_eq!(path, PathBuf::from("/tmp/a.b.mp4"));
    }

    #[test]
    fn test_extension_from_content_type_video() {
        assert_eq!(extension_from_content_type("video/mp4"), Some(".mp4"));
        assert_eq!(extension_from_content_type("video/webm"), Some(".webm"));
    }

    #[test]
    fn test_extension_from_content_type_audio() {
        assert_eq!(extension_from_content_type("audio/mpeg"), Some(".mp3"));
        assert_eq!(extension_from_content_type("audio/x-wav"), Some(".wav"));
    }

    #[test]
    fn test_extension_from_content_type_image() {
        assert_eq!(extension_from_content_type("image/jpeg"), Some(".jpg"));
        assert_eq!(extension_from_content_type("image/png"), Some(".png"));
    }

    #[test]
    fn test_extension_from_content_type_strips_parameters() {
        assert_eq!(
            extension_from_content_type("text/plain; charset=utf-8"),
            Some(".txt")
        );
    }

    #[test]
    fn test_extension_from_content_type_case_insensitive() {
        assert_eq!(extension_from_content_type("Video/MP4"), Some(".mp4"));
    }

    #[test]
    fn test_extension_from_content_type_unknown_is_none() {
        assert_eq!(extension_from_content_type("application/octet-stream"), None);
        assert_eq!(extension_from_content_type("application/x-custom"), None);
        assert_eq!(extension_from_content_type(""), None);
    }
}
