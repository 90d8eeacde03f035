//! Retry orchestration for a single fetch.
//!
//! [`Fetcher`] probes the network once, plans timeouts, then runs sequential
//! attempts. Every failure is classified before anything else happens, and
//! the category decides cleanup, backoff, re-probing and whether to stop.
//!
//! # Example
//!
//! ```no_run
//! use mediafetch_core::download::{DownloadRequest, Fetcher};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = DownloadRequest::new("https://cdn.example.com/clip", "./downloads")
//!     .with_total_timeout(Duration::from_secs(120))
//!     .with_max_retries(2);
//! let path = Fetcher::new().download(&request).await?;
//! println!("Saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::client::{HttpClient, StreamOptions, stream_to_file};
use super::config::FetchConfig;
use super::constants::{DEFAULT_SIZE_LIMIT, DEFAULT_TOTAL_TIMEOUT};
use super::error::DownloadError;
use super::filename::{base_save_path, extension_from_content_type, with_extension_appended};
use super::integrity::{cleanup_partial, validate};
use super::probe::{NetworkProbe, NetworkQuality};
use super::progress::{LogProgress, ProgressObserver};
use super::retry::{
    DEFAULT_MAX_RETRIES, FailureCategory, FailureState, RetryDecision, classify_error,
    should_resume,
};
use super::timeouts::TimeoutPlan;

/// Parameters for one fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Absolute http(s) URL of the resource.
    pub url: String,
    /// Directory the file is written into; created if missing.
    pub save_dir: PathBuf,
    /// Byte-size ceiling for the file.
    pub size_limit: u64,
    /// Hard ceiling for each attempt.
    pub total_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl DownloadRequest {
    /// Creates a request with the default ceiling (200 MiB), total timeout
    /// (90s) and retry count (3).
    #[must_use]
    pub fn new(url: impl Into<String>, save_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            save_dir: save_dir.into(),
            size_limit: DEFAULT_SIZE_LIMIT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn with_size_limit(mut self, size_limit: u64) -> Self {
        self.size_limit = size_limit;
        self
    }

    #[must_use]
    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = total_timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Call-scoped state carried across attempts.
#[derive(Debug)]
struct DownloadContext {
    url: String,
    save_path: PathBuf,
    quality: NetworkQuality,
    range_supported: bool,
    plan: TimeoutPlan,
    extension_resolved: bool,
    consecutive_failures: u32,
}

impl DownloadContext {
    /// Appends the extension for `content_type` to the save path, once.
    fn resolve_extension(&mut self, content_type: Option<&str>) {
        if self.extension_resolved {
            return;
        }
        self.extension_resolved = true;

        match content_type.and_then(extension_from_content_type) {
            Some(extension) => {
                self.save_path = with_extension_appended(&self.save_path, extension);
                debug!(extension, path = %self.save_path.display(), "save path resolved");
            }
            None => {
                debug!(content_type, "no extension for content type");
            }
        }
    }
}

/// Resilient single-file fetcher.
///
/// Holds no per-call state, so one instance can serve concurrent calls.
#[derive(Clone)]
pub struct Fetcher {
    config: FetchConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    /// Creates a fetcher with default tunables that logs progress.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FetchConfig::default())
    }

    /// Creates a fetcher with custom tunables.
    #[must_use]
    pub fn with_config(config: FetchConfig) -> Self {
        Self {
            config,
            observer: Arc::new(LogProgress),
        }
    }

    /// Replaces the progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the tunables in use.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches `request.url` into `request.save_dir`.
    ///
    /// Returns the path of the verified file. On any final failure the
    /// partial file has been removed.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] before any network activity
    /// - [`DownloadError::Io`] if the save directory cannot be created
    /// - the first fatal error, or the last error once retries are exhausted
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn download(&self, request: &DownloadRequest) -> Result<PathBuf, DownloadError> {
        validate_url(&request.url)?;
        tokio::fs::create_dir_all(&request.save_dir)
            .await
            .map_err(|e| DownloadError::io(&request.save_dir, e))?;

        let probe = NetworkProbe::new(&self.config)
            .map_err(|e| DownloadError::network(&request.url, e))?;
        let quality = probe.assess_quality(&request.url).await;
        let range_supported = probe.check_range_support(&request.url).await;
        let plan = TimeoutPlan::plan(quality, request.total_timeout);

        let mut ctx = DownloadContext {
            url: request.url.clone(),
            save_path: base_save_path(&request.save_dir),
            quality,
            range_supported,
            plan,
            extension_resolved: false,
            consecutive_failures: 0,
        };

        info!(
            %quality,
            range_supported,
            connect_secs = plan.connect.as_secs(),
            read_secs = plan.read.as_secs(),
            chunk_stall_secs = plan.chunk_stall.as_secs(),
            total_secs = plan.total.as_secs(),
            "download planned"
        );

        let total_attempts = request.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 0..=request.max_retries {
            let resume_from = self.resume_offset(&ctx, attempt).await;
            info!(
                attempt = attempt.saturating_add(1),
                total_attempts,
                resume_from,
                path = %ctx.save_path.display(),
                "starting download attempt"
            );

            let error = match self.attempt(&mut ctx, request, resume_from).await {
                Ok(bytes) => {
                    info!(path = %ctx.save_path.display(), bytes, "download complete");
                    return Ok(ctx.save_path);
                }
                Err(error) => error,
            };

            ctx.consecutive_failures = ctx.consecutive_failures.saturating_add(1);
            let category = classify_error(&error);
            log_failure(&error, category, attempt, total_attempts);

            let state = FailureState {
                attempt,
                max_retries: request.max_retries,
                consecutive_failures: ctx.consecutive_failures,
                range_supported: ctx.range_supported,
            };

            match self.config.retry_policy.should_retry(category, &state) {
                RetryDecision::Retry {
                    delay,
                    cleanup,
                    reprobe,
                } => {
                    if cleanup {
                        cleanup_partial(&ctx.save_path).await;
                    }
                    info!(
                        next_attempt = attempt.saturating_add(2),
                        delay_ms = delay.as_millis(),
                        cleanup,
                        "retrying download"
                    );
                    tokio::time::sleep(delay).await;

                    if reprobe {
                        ctx.quality = probe.assess_quality(&ctx.url).await;
                        ctx.plan = TimeoutPlan::plan(ctx.quality, request.total_timeout);
                        debug!(quality = %ctx.quality, "timeouts re-planned");
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    info!(%category, %reason, "not retrying");
                    last_error = Some(error);
                    break;
                }
            }
        }

        cleanup_partial(&ctx.save_path).await;
        let error =
            last_error.unwrap_or_else(|| DownloadError::exhausted(&ctx.url, total_attempts));
        error!(error = %error, "download failed");
        Err(error)
    }

    /// Offset to resume from, if the partial on disk qualifies.
    async fn resume_offset(&self, ctx: &DownloadContext, attempt: u32) -> Option<u64> {
        let existing = tokio::fs::metadata(&ctx.save_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let resume = should_resume(
            ctx.range_supported,
            existing,
            self.config.min_partial_size,
            attempt,
            ctx.consecutive_failures,
        );
        debug!(existing, resume, "partial file inspected");
        resume.then_some(existing)
    }

    /// Runs one transfer: open, stream, verify.
    async fn attempt(
        &self,
        ctx: &mut DownloadContext,
        request: &DownloadRequest,
        resume_from: Option<u64>,
    ) -> Result<u64, DownloadError> {
        let started = Instant::now();
        let client = HttpClient::for_plan(&ctx.plan, self.config.connection_retry_delay)
            .map_err(|e| DownloadError::network(&ctx.url, e))?;

        let transfer = match client.open(&ctx.url, resume_from).await {
            Ok(transfer) => transfer,
            Err(error @ DownloadError::UnexpectedRange { .. }) => {
                cleanup_partial(&ctx.save_path).await;
                return Err(error);
            }
            Err(error) => return Err(error),
        };

        let resumed = transfer.resumed;
        if !resumed {
            ctx.resolve_extension(transfer.meta.content_type.as_deref());
        }

        let meta = transfer.meta.clone();
        let options = StreamOptions {
            url: ctx.url.clone(),
            append: resumed,
            existing_bytes: if resumed { resume_from.unwrap_or(0) } else { 0 },
            size_limit: request.size_limit,
            started,
            total_timeout: ctx.plan.total,
            chunk_stall: ctx.plan.chunk_stall,
            max_stalls: self.config.max_consecutive_stalls,
            progress_interval: self.config.progress_interval,
            buffer_size: self.config.chunk_size,
        };

        stream_to_file(
            transfer.into_body(),
            &ctx.save_path,
            &options,
            self.observer.as_ref(),
        )
        .await?;

        validate(&meta, &ctx.save_path, resumed).await
    }
}

/// Fetches `url` into `save_dir` with a default [`Fetcher`].
///
/// # Errors
///
/// See [`Fetcher::download`].
pub async fn download(
    url: &str,
    save_dir: impl AsRef<Path>,
    size_limit: u64,
    total_timeout: Duration,
    max_retries: u32,
) -> Result<PathBuf, DownloadError> {
    let request = DownloadRequest::new(url, save_dir.as_ref())
        .with_size_limit(size_limit)
        .with_total_timeout(total_timeout)
        .with_max_retries(max_retries);
    Fetcher::new().download(&request).await
}

/// Rejects anything that is not an absolute http(s) URL with a host.
fn validate_url(url: &str) -> Result<(), DownloadError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(DownloadError::invalid_url(url)),
    }
}

fn log_failure(error: &DownloadError, category: FailureCategory, attempt: u32, total: u32) {
    let attempt = attempt.saturating_add(1);
    match category {
        FailureCategory::Unknown => {
            error!(attempt, total, %category, error = %error, "unexpected download failure");
        }
        FailureCategory::Fatal => {
            error!(attempt, total, %category, error = %error, "fatal download failure");
        }
        FailureCategory::Network => {
            warn!(attempt, total, %category, error = %error, "network failure, quality will be re-assessed");
        }
        FailureCategory::Server => {
            warn!(attempt, total, %category, error = %error, "server failure");
        }
    }
}
