//! Mediafetch Core Library
//!
//! Downloads a single remote media file to local storage over unreliable
//! networks. The fetcher measures latency to the origin, scales its timeouts
//! to match, resumes interrupted transfers where the server allows it and
//! only hands back files whose size matches what the server declared.
//!
//! # Architecture
//!
//! Everything lives in [`download`]:
//! - `probe` - origin latency tiers and range-support detection
//! - `timeouts` - per-tier connect/read/stall timeout plans
//! - `client` - one GET streamed to disk with total/stall/size guards
//! - `integrity` - on-disk size verification
//! - `retry` - failure classification and backoff policy
//! - `engine` - the [`Fetcher`] attempt loop

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod user_agent;

// Re-export commonly used types
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, DownloadRequest, FailureCategory, FetchConfig, Fetcher,
    LogProgress, NetworkQuality, ProgressObserver, ProgressUpdate, RetryDecision, RetryPolicy,
    TimeoutPlan, classify_error, download,
};
