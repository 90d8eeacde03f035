//! Resilient HTTP fetching of a single media file.
//!
//! This module downloads one remote resource to a local file while adapting
//! to network conditions, resuming partial transfers and verifying the result.
//!
//! # Features
//!
//! - Origin latency probe that picks a timeout plan (good, medium, poor)
//! - Streaming transfer with total timeout, stall detection and size ceiling
//! - Range-based resumption when the server advertises `Accept-Ranges: bytes`
//! - Size verification against `Content-Length` / `Content-Range`
//! - Failure classification driving backoff, cleanup and re-probing
//!
//! # Example
//!
//! ```no_run
//! use mediafetch_core::download::{DownloadRequest, Fetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = DownloadRequest::new("https://cdn.example.com/video", "./downloads");
//! let file_path = Fetcher::new().download(&request).await?;
//! println!("Downloaded: {}", file_path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod constants;
mod engine;
mod error;
pub mod filename;
pub mod integrity;
mod probe;
mod progress;
mod retry;
mod timeouts;

pub use client::{HttpClient, ResponseMeta, StreamOptions, Transfer, stream_to_file};
pub use config::FetchConfig;
pub use engine::{DownloadRequest, Fetcher, download};
pub use error::DownloadError;
pub use integrity::{ContentRange, cleanup_partial, parse_content_range, validate};
pub use probe::{NetworkProbe, NetworkQuality, origin_of};
pub use progress::{LogProgress, ProgressObserver, ProgressUpdate};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureCategory, FailureState, RetryDecision, RetryPolicy,
    classify_error, should_cleanup, should_resume,
};
pub use timeouts::TimeoutPlan;

// No module-local Result alias: signatures spell out `Result<T, DownloadError>`.
