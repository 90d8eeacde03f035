//! Connection-quality probing and byte-range support detection.
//!
//! Both probes are best-effort: they never return an error. A failed
//! latency probe reports [`NetworkQuality::Poor`] and a failed range check
//! reports `false`.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT_RANGES;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::build_client;
use super::config::FetchConfig;
use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Coarse classification of perceived network responsiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkQuality {
    /// Origin answered quickly.
    Good,
    /// Origin answered, but not quickly.
    Medium,
    /// Origin was slow or unreachable.
    Poor,
}

impl NetworkQuality {
    /// Classifies a measured round trip against the two thresholds.
    #[must_use]
    pub fn from_round_trip(elapsed: Duration, good: Duration, medium: Duration) -> Self {
        if elapsed < good {
            Self::Good
        } else if elapsed < medium {
            Self::Medium
        } else {
            Self::Poor
        }
    }

    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Medium => "medium",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `scheme://host[:port]` for a URL, or `None` for opaque origins.
#[must_use]
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Issues the latency and range-support HEAD requests.
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    /// Short-timeout client for the origin latency probe.
    latency_client: Client,
    /// Standard-timeout client for the range-support HEAD.
    head_client: Client,
    good_threshold: Duration,
    medium_threshold: Duration,
    range_check_retries: u32,
    retry_delay: Duration,
}

impl NetworkProbe {
    /// Builds the probe clients.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if a client cannot be constructed.
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            latency_client: build_client(config.probe_connect_timeout, config.probe_read_timeout)?,
            head_client: build_client(
                Duration::from_secs(CONNECT_TIMEOUT_SECS),
                Duration::from_secs(READ_TIMEOUT_SECS),
            )?,
            good_threshold: config.good_threshold,
            medium_threshold: config.medium_threshold,
            range_check_retries: config.range_check_retries,
            retry_delay: config.connection_retry_delay,
        })
    }

    /// Measures a HEAD round trip to the URL's origin.
    ///
    /// Any HTTP status counts as an answer; only the elapsed time matters.
    #[instrument(level = "debug", skip(self))]
    pub async fn assess_quality(&self, url: &str) -> NetworkQuality {
        let Some(origin) = origin_of(url) else {
            warn!(url, "cannot derive origin for quality probe");
            return NetworkQuality::Poor;
        };

        let start = Instant::now();
        match self.latency_client.head(&origin).send().await {
            Ok(response) => {
                let elapsed = start.elapsed();
                let quality = NetworkQuality::from_round_trip(
                    elapsed,
                    self.good_threshold,
                    self.medium_threshold,
                );
                debug!(
                    %origin,
                    status = response.status().as_u16(),
                    elapsed_ms = elapsed.as_millis(),
                    %quality,
                    "network quality assessed"
                );
                quality
            }
            Err(error) => {
                warn!(%origin, %error, "failed to assess network quality");
                NetworkQuality::Poor
            }
        }
    }

    /// Checks whether the server advertises `Accept-Ranges: bytes`.
    #[instrument(level = "debug", skip(self))]
    pub async fn check_range_support(&self, url: &str) -> bool {
        let attempts = self.range_check_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.head_accept_ranges(url).await {
                Ok(accept_ranges) => {
                    let supported = accept_ranges
                        .as_deref()
                        .is_some_and(|v| v.trim().eq_ignore_ascii_case("bytes"));
                    info!(
                        attempt,
                        accept_ranges = accept_ranges.as_deref().unwrap_or(""),
                        supported,
                        "range support checked"
                    );
                    return supported;
                }
                Err(error) if attempt < attempts => {
                    warn!(attempt, %error, "range support check failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(error) => {
                    warn!(attempts, %error, "range support check failed, assuming unsupported");
                }
            }
        }
        false
    }

    async fn head_accept_ranges(&self, url: &str) -> Result<Option<String>, reqwest::Error> {
        let response = self.head_client.head(url).send().await?;
        let response = response.error_for_status()?;
        Ok(response
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}
