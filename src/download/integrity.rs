//! Post-transfer size verification.
//!
//! A fresh transfer is checked against `Content-Length`; a resumed one against
//! the total in `Content-Range`. Missing or wildcard headers cannot be
//! verified and are accepted.

use std::path::Path;

use tracing::{debug, warn};

use super::DownloadError;
use super::client::ResponseMeta;

/// Parsed `Content-Range: bytes <start>-<end>/<total>` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte offset in this response.
    pub start: u64,
    /// Last byte offset in this response (inclusive).
    pub end: u64,
    /// Full resource length, `None` for `*`.
    pub total: Option<u64>,
}

/// Parses a `Content-Range` header value.
///
/// Returns `None` for anything that is not a satisfied byte range
/// (including `bytes */1234`).
#[must_use]
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.trim().split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => None,
        digits => Some(digits.parse::<u64>().ok()?),
    };
    Some(ContentRange { start, end, total })
}

/// Confirms the file at `path` has the size the server declared.
///
/// On mismatch the file is deleted and [`DownloadError::Integrity`] returned.
/// Returns the verified (or unverifiable) on-disk size on success.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the file cannot be inspected and
/// [`DownloadError::Integrity`] on a size mismatch.
pub async fn validate(
    meta: &ResponseMeta,
    path: &Path,
    is_resume: bool,
) -> Result<u64, DownloadError> {
    let actual = tokio::fs::metadata(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?
        .len();

    let expected = if is_resume {
        match meta.content_range.as_deref() {
            Some(raw) => match parse_content_range(raw) {
                Some(range) => range.total,
                None => {
                    warn!(content_range = raw, "failed to parse Content-Range header");
                    None
                }
            },
            None => None,
        }
    } else {
        meta.content_length
    };

    let Some(expected) = expected else {
        debug!(path = %path.display(), actual, is_resume, "size not declared, skipping integrity check");
        return Ok(actual);
    };

    if actual != expected {
        warn!(
            url = %meta.url,
            path = %path.display(),
            expected,
            actual,
            is_resume,
            "download incomplete, removing file"
        );
        cleanup_partial(path).await;
        return Err(DownloadError::integrity(path, expected, actual));
    }

    Ok(actual)
}

/// Best-effort removal of a partial file. Never fails.
pub async fn cleanup_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
