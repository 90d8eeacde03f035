//! HTTP transfer execution.
//!
//! This module provides [`HttpClient`], which opens a single fresh or
//! range-resumed GET, and [`stream_to_file`], the chunk loop that writes the
//! body to disk while enforcing the total timeout, stall detection and the
//! size ceiling.

use std::path::Path;
use std::pin::pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderName, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::integrity::parse_content_range;
use super::progress::{ProgressObserver, ProgressUpdate};
use super::timeouts::TimeoutPlan;
use crate::user_agent::download_headers;

/// Connection tries per transfer before a connect/timeout error is surfaced.
const OPEN_TRIES: u32 = 2;

/// Builds a reqwest client with the fetch headers and the given timeouts.
///
/// `read` bounds socket inactivity, not the whole body, so long transfers
/// are governed by the chunk loop instead.
pub(crate) fn build_client(connect: Duration, read: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect)
        .read_timeout(read)
        .default_headers(download_headers())
        .build()
}

/// Header values captured before the body is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Final request URL (after redirects).
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    /// Raw `Content-Range` header, if any.
    pub content_range: Option<String>,
    /// Raw `Content-Type` header, if any.
    pub content_type: Option<String>,
}

impl ResponseMeta {
    fn from_response(response: &Response) -> Self {
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            url: response.url().to_string(),
            status: response.status().as_u16(),
            content_length: header(CONTENT_LENGTH).and_then(|v| v.trim().parse::<u64>().ok()),
            content_range: header(CONTENT_RANGE),
            content_type: header(CONTENT_TYPE),
        }
    }
}

/// An opened transfer whose body has not been read yet.
#[derive(Debug)]
pub struct Transfer {
    /// Headers of the response.
    pub meta: ResponseMeta,
    /// True only when a range was requested and the server answered 206.
    pub resumed: bool,
    response: Response,
}

impl Transfer {
    /// Consumes the transfer into a body stream with errors mapped to
    /// [`DownloadError::Network`].
    pub fn into_body(self) -> impl Stream<Item = Result<Bytes, DownloadError>> + Send {
        let url = self.meta.url;
        self.response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(url.clone(), e)))
    }
}

/// HTTP client configured from one [`TimeoutPlan`].
///
/// A new client is built whenever the plan changes; connection pooling
/// only matters within one fetch call.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_delay: Duration,
}

impl HttpClient {
    /// Creates a client using the plan's connect and read timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be constructed.
    pub fn for_plan(plan: &TimeoutPlan, retry_delay: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(plan.connect, plan.read)?,
            retry_delay,
        })
    }

    /// Opens a GET for `url`, optionally resuming at `resume_from`.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Network`] if the connection cannot be established
    /// - [`DownloadError::HttpStatus`] for non-2xx responses
    /// - [`DownloadError::UnexpectedRange`] if a 206 starts at the wrong offset
    #[instrument(skip(self))]
    pub async fn open(&self, url: &str, resume_from: Option<u64>) -> Result<Transfer, DownloadError> {
        let offset = resume_from.filter(|offset| *offset > 0);
        let response = self.send_with_retry(url, offset).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let meta = ResponseMeta::from_response(&response);
        let resumed = match offset {
            Some(requested) if status == StatusCode::PARTIAL_CONTENT => {
                if let Some(range) = meta.content_range.as_deref().and_then(parse_content_range)
                    && range.start != requested
                {
                    return Err(DownloadError::unexpected_range(url, requested, range.start));
                }
                info!(offset = requested, "resuming download");
                true
            }
            Some(requested) => {
                warn!(
                    offset = requested,
                    status = status.as_u16(),
                    "server declined partial content, restarting from zero"
                );
                false
            }
            None => {
                debug!(status = status.as_u16(), "fresh download opened");
                false
            }
        };

        Ok(Transfer {
            meta,
            resumed,
            response,
        })
    }

    async fn send_with_retry(
        &self,
        url: &str,
        offset: Option<u64>,
    ) -> Result<Response, DownloadError> {
        let mut tries = 0;
        loop {
            tries += 1;
            let mut request = self.client.get(url);
            if let Some(offset) = offset {
                request = request.header(RANGE, format!("bytes={offset}-"));
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if tries < OPEN_TRIES && (e.is_connect() || e.is_timeout()) => {
                    warn!(tries, error = %e, "connection failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(DownloadError::network(url, e)),
            }
        }
    }
}

/// Limits and bookkeeping inputs for one run of the chunk loop.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// URL used in errors and progress notifications.
    pub url: String,
    /// Append to an existing partial instead of truncating.
    pub append: bool,
    /// Bytes already on disk when appending.
    pub existing_bytes: u64,
    /// Byte-size ceiling for the whole file.
    pub size_limit: u64,
    /// When the attempt began; the total timeout is measured from here.
    pub started: Instant,
    /// Hard ceiling for the attempt.
    pub total_timeout: Duration,
    /// Window after which a missing chunk counts as a stall.
    pub chunk_stall: Duration,
    /// Consecutive stalls that abort the transfer.
    pub max_stalls: u32,
    /// Minimum spacing between progress notifications.
    pub progress_interval: Duration,
    /// Write buffer capacity.
    pub buffer_size: usize,
}

/// Streams a body to `path`, returning the bytes written by this attempt.
///
/// Each chunk is written whole before any bookkeeping. The writer is
/// flushed on every exit path so a failed attempt leaves every received
/// chunk on disk for resumption.
///
/// # Errors
///
/// - [`DownloadError::Timeout`] once the attempt exceeds its total budget
/// - [`DownloadError::Stalled`] after `max_stalls` consecutive empty windows
/// - [`DownloadError::SizeLimitExceeded`] if the file would pass the ceiling
/// - [`DownloadError::Io`] for file system failures
/// - any error yielded by the stream itself
pub async fn stream_to_file<S>(
    body: S,
    path: &Path,
    options: &StreamOptions,
    observer: &dyn ProgressObserver,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<Bytes, DownloadError>>,
{
    let file = open_output(path, options.append).await?;
    let mut writer = BufWriter::with_capacity(options.buffer_size.max(1), file);

    let outcome = write_chunks(body, &mut writer, path, options, observer).await;
    let flushed = writer.flush().await.map_err(|e| DownloadError::io(path, e));
    let attempt_bytes = outcome?;
    flushed?;

    debug!(bytes = attempt_bytes, "body streamed to disk");
    Ok(attempt_bytes)
}

async fn write_chunks<S>(
    body: S,
    writer: &mut BufWriter<File>,
    path: &Path,
    options: &StreamOptions,
    observer: &dyn ProgressObserver,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<Bytes, DownloadError>>,
{
    let mut body = pin!(body);

    let mut total_bytes = options.existing_bytes;
    let mut attempt_bytes: u64 = 0;
    let mut stalls: u32 = 0;
    let mut last_progress = options.started;

    loop {
        let elapsed = options.started.elapsed();
        if elapsed > options.total_timeout {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                total_ms = options.total_timeout.as_millis(),
                "download total timeout"
            );
            return Err(DownloadError::timeout(&options.url, elapsed));
        }

        let remaining = options.total_timeout - elapsed;
        let window = options.chunk_stall.min(remaining);
        let next = match tokio::time::timeout(window, body.next()).await {
            Ok(next) => next,
            Err(_) if window < options.chunk_stall => {
                // The total budget ran out before the stall window did.
                let elapsed = options.started.elapsed();
                warn!(elapsed_ms = elapsed.as_millis(), "download total timeout");
                return Err(DownloadError::timeout(&options.url, elapsed));
            }
            Err(_) => {
                stalls += 1;
                warn!(
                    stalls,
                    window_ms = options.chunk_stall.as_millis(),
                    "network stall detected"
                );
                if stalls >= options.max_stalls {
                    return Err(DownloadError::stalled(&options.url, stalls));
                }
                continue;
            }
        };

        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        stalls = 0;

        let len = chunk.len() as u64;
        if total_bytes.saturating_add(len) > options.size_limit {
            warn!(
                bytes = total_bytes.saturating_add(len),
                limit = options.size_limit,
                "file size limit exceeded"
            );
            return Err(DownloadError::size_limit(&options.url, options.size_limit));
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        total_bytes += len;
        attempt_bytes += len;

        if last_progress.elapsed() >= options.progress_interval {
            let update = ProgressUpdate::new(
                total_bytes,
                options.size_limit,
                attempt_bytes,
                options.started.elapsed().as_secs_f64(),
            );
            observer.on_progress(&options.url, &update);
            last_progress = Instant::now();
        }
    }

    debug!(total = total_bytes, "end of body");
    Ok(attempt_bytes)
}

async fn open_output(path: &Path, append: bool) -> Result<File, DownloadError> {
    let file = if append {
        OpenOptions::new().create(true).append(true).open(path).await
    } else {
        File::create(path).await
    };
    file.map_err(|e| DownloadError::io(path, e))
}
