//! Error types for the download module.
//!
//! Every failure raised while probing or transferring is one of these
//! variants. The retry loop classifies them with
//! [`classify_error`](super::classify_error) before deciding anything.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during a fetch.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Transport-level error (DNS, connection refused, reset, malformed body, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt ran past the plan's total timeout.
    #[error("timeout downloading {url} after {:.1}s", .elapsed.as_secs_f64())]
    Timeout {
        /// The URL that timed out.
        url: String,
        /// Time spent in the transfer when it was aborted.
        elapsed: Duration,
    },

    /// No data arrived for too many consecutive chunk-stall windows.
    #[error("network connection unstable downloading {url}: {stalls} consecutive stalls")]
    Stalled {
        /// The URL whose transfer stalled.
        url: String,
        /// Number of consecutive stall windows observed.
        stalls: u32,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The transfer grew past the caller's byte-size ceiling.
    #[error("file size limit exceeded downloading {url}: more than {limit_bytes} bytes")]
    SizeLimitExceeded {
        /// The URL being downloaded.
        url: String,
        /// The configured ceiling in bytes.
        limit_bytes: u64,
    },

    /// Downloaded file size does not match the size declared by the server.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// A ranged response started somewhere other than the requested offset.
    #[error("server answered range request for {url} at byte {received}, expected {requested}")]
    UnexpectedRange {
        /// The URL being resumed.
        url: String,
        /// Offset sent in the `Range` header.
        requested: u64,
        /// Start offset reported by `Content-Range`.
        received: u64,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or not HTTP(S).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// All attempts were used up without a recorded cause.
    #[error("download failed for {url} after {attempts} attempts")]
    Exhausted {
        /// The URL that could not be fetched.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a total-timeout error.
    pub fn timeout(url: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            elapsed,
        }
    }

    /// Creates a stall error.
    pub fn stalled(url: impl Into<String>, stalls: u32) -> Self {
        Self::Stalled {
            url: url.into(),
            stalls,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a size-ceiling error.
    pub fn size_limit(url: impl Into<String>, limit_bytes: u64) -> Self {
        Self::SizeLimitExceeded {
            url: url.into(),
            limit_bytes,
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates an unexpected-range error.
    pub fn unexpected_range(url: impl Into<String>, requested: u64, received: u64) -> Self {
        Self::UnexpectedRange {
            url: url.into(),
            requested,
            received,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates the fallback error reported when retries run out with no cause.
    pub fn exhausted(url: impl Into<String>, attempts: u32) -> Self {
        Self::Exhausted {
            url: url.into(),
            attempts,
        }
    }
}

// Note on From trait implementations:
// There is no `From<reqwest::Error>` or `From<std::io::Error>` because every
// variant needs context (url, path) the source errors don't carry. Use the
// helper constructors above.
