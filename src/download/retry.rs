//! Failure classification and retry decisions for fetch attempts.
//!
//! This module provides [`FailureCategory`] and [`classify_error`] for
//! normalizing any [`DownloadError`], and [`RetryPolicy`] for turning a
//! classified failure into a [`RetryDecision`].
//!
//! # Overview
//!
//! Every failed attempt is classified first:
//! - [`FailureCategory::Network`] - connection, timeout, stall or body errors
//! - [`FailureCategory::Server`] - 5xx and ambiguous statuses, size mismatches
//! - [`FailureCategory::Fatal`] - size ceiling, 401/403/404, bad URL
//! - [`FailureCategory::Unknown`] - everything else
//!
//! The policy then decides whether another attempt is made, whether the
//! partial file survives, and how long to wait.
//!
//! # Example
//!
//! ```
//! use mediafetch_core::download::{
//!     DownloadError, FailureCategory, FailureState, RetryDecision, RetryPolicy, classify_error,
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/clip.mp4", 503);
//! let category = classify_error(&error);
//! assert_eq!(category, FailureCategory::Server);
//!
//! let state = FailureState { attempt: 0, max_retries: 3, consecutive_failures: 1, range_supported: true };
//! match policy.should_retry(category, &state) {
//!     RetryDecision::Retry { delay, cleanup, .. } => {
//!         println!("retrying in {delay:?}, discard partial: {cleanup}");
//!     }
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delays indexed by attempt; later attempts reuse the last entry.
const DEFAULT_BASE_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Default maximum delay cap (8 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Default minimum delay (1 second).
const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

const NETWORK_MULTIPLIER: f64 = 1.2;
const SERVER_MULTIPLIER: f64 = 1.1;
const REPEATED_FAILURE_MULTIPLIER: f64 = 1.1;

/// Consecutive failures at which the backoff grows further.
const REPEATED_FAILURE_THRESHOLD: u32 = 2;

/// Consecutive failures at which a partial file is no longer trusted.
const CLEANUP_FAILURE_THRESHOLD: u32 = 3;

/// Resumption is only attempted while consecutive failures stay at or below this.
const RESUME_FAILURE_LIMIT: u32 = 2;

/// Classification of fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Transient transport trouble; retry, possibly resuming.
    Network,
    /// Remote 5xx or ambiguous responses; retry, file usually kept.
    Server,
    /// Never retried; the partial file is always deleted.
    Fatal,
    /// Unrecognized; retried like a transient failure but logged loudly.
    Unknown,
}

impl FailureCategory {
    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Fatal => "fatal",
            Self::Unknown => "unknown",
        }
    }

    fn backoff_multiplier(self) -> f64 {
        match self {
            Self::Network => NETWORK_MULTIPLIER,
            Self::Server => SERVER_MULTIPLIER,
            Self::Fatal | Self::Unknown => 1.0,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the retry loop stands when an attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureState {
    /// Zero-based index of the attempt that just failed.
    pub attempt: u32,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Failures in a row, including this one.
    pub consecutive_failures: u32,
    /// Whether the server advertised byte ranges.
    pub range_supported: bool,
}

/// Decision on whether to make another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then try again.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// Whether the partial file must be deleted first.
        cleanup: bool,
        /// Whether network quality should be measured again.
        reprobe: bool,
    },

    /// Stop; the partial file must be deleted.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Backoff schedule between attempts.
///
/// # Default Values
///
/// - base delays: 1s, 2s, 4s (clamped to 4s for later attempts)
/// - `max_delay`: 8 seconds
/// - `min_delay`: 1 second
///
/// # Delay Calculation
///
/// ```text
/// delay = clamp(base[attempt] * category_multiplier * repeat_multiplier, min_delay, max_delay)
/// ```
///
/// `category_multiplier` is 1.2 for network, 1.1 for server and 1.0 otherwise;
/// `repeat_multiplier` is 1.1 once two or more failures happened in a row.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delays: Vec<Duration>,
    max_delay: Duration,
    min_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delays: DEFAULT_BASE_DELAYS.to_vec(),
            max_delay: DEFAULT_MAX_DELAY,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a custom schedule.
    ///
    /// An empty `base_delays` behaves like a single zero entry. `min_delay`
    /// is lowered to `max_delay` if it exceeds it.
    #[must_use]
    pub fn new(base_delays: Vec<Duration>, max_delay: Duration, min_delay: Duration) -> Self {
        Self {
            base_delays,
            max_delay,
            min_delay: min_delay.min(max_delay),
        }
    }

    /// A policy that never sleeps.
    #[must_use]
    pub fn immediate() -> Self {
        Self::new(vec![Duration::ZERO], Duration::ZERO, Duration::ZERO)
    }

    /// Returns the delay cap.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Determines what happens after a failed attempt.
    #[instrument(skip(self))]
    pub fn should_retry(&self, category: FailureCategory, state: &FailureState) -> RetryDecision {
        if category == FailureCategory::Fatal {
            return RetryDecision::DoNotRetry {
                reason: "fatal failure - retry would not help".to_string(),
            };
        }

        if state.attempt >= state.max_retries {
            debug!(
                attempt = state.attempt,
                max_retries = state.max_retries,
                "max attempts reached"
            );
            return RetryDecision::DoNotRetry {
                reason: format!(
                    "max attempts ({}) exhausted",
                    state.max_retries.saturating_add(1)
                ),
            };
        }

        let delay = self.backoff_delay(state.attempt, category, state.consecutive_failures);
        let cleanup =
            should_cleanup(category, state.range_supported, state.consecutive_failures);

        debug!(
            attempt = state.attempt,
            next_attempt = state.attempt.saturating_add(1),
            delay_ms = delay.as_millis(),
            cleanup,
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            cleanup,
            reprobe: category == FailureCategory::Network,
        }
    }

    /// Computes the wait before the attempt following `attempt`.
    #[must_use]
    pub fn backoff_delay(
        &self,
        attempt: u32,
        category: FailureCategory,
        consecutive_failures: u32,
    ) -> Duration {
        let index = usize::try_from(attempt)
            .unwrap_or(usize::MAX)
            .min(self.base_delays.len().saturating_sub(1));
        let base = self.base_delays.get(index).copied().unwrap_or_default();

        let mut multiplier = category.backoff_multiplier();
        if consecutive_failures >= REPEATED_FAILURE_THRESHOLD {
            multiplier *= REPEATED_FAILURE_MULTIPLIER;
        }

        base.mul_f64(multiplier)
            .min(self.max_delay)
            .max(self.min_delay)
    }
}

/// Whether a partial file must be discarded before the next attempt.
#[must_use]
pub fn should_cleanup(
    category: FailureCategory,
    range_supported: bool,
    consecutive_failures: u32,
) -> bool {
    category == FailureCategory::Fatal
        || !range_supported
        || consecutive_failures >= CLEANUP_FAILURE_THRESHOLD
}

/// Whether the next attempt may continue from an existing partial file.
#[must_use]
pub fn should_resume(
    range_supported: bool,
    existing_bytes: u64,
    min_partial_size: u64,
    attempt: u32,
    consecutive_failures: u32,
) -> bool {
    range_supported
        && existing_bytes >= min_partial_size
        && attempt > 0
        && consecutive_failures <= RESUME_FAILURE_LIMIT
}

/// Classifies a download error into a failure category.
///
/// # HTTP Status Code Classification
///
/// | Status | Category |
/// |--------|----------|
/// | 401, 403, 404 | Fatal |
/// | 500-599 | Server |
/// | any other | Server |
///
/// # Non-HTTP Errors
///
/// | Error | Category |
/// |-------|----------|
/// | SizeLimitExceeded | Fatal |
/// | InvalidUrl | Fatal |
/// | Timeout, Stalled | Network |
/// | Network (connect, timeout, body, decode, request) | Network |
/// | Network (other) | Unknown |
/// | Integrity, UnexpectedRange | Server |
/// | Io, Exhausted | Unknown |
#[instrument(level = "debug")]
pub fn classify_error(error: &DownloadError) -> FailureCategory {
    match error {
        DownloadError::SizeLimitExceeded { .. } | DownloadError::InvalidUrl { .. } => {
            FailureCategory::Fatal
        }

        DownloadError::Timeout { .. } | DownloadError::Stalled { .. } => FailureCategory::Network,

        DownloadError::Network { source, .. } => classify_transport(source),

        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),

        DownloadError::Integrity { .. } | DownloadError::UnexpectedRange { .. } => {
            FailureCategory::Server
        }

        DownloadError::Io { .. } | DownloadError::Exhausted { .. } => FailureCategory::Unknown,
    }
}

/// Classifies an HTTP status code.
#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureCategory {
    match status {
        401 | 403 | 404 => FailureCategory::Fatal,
        500..=599 => FailureCategory::Server,
        _ => FailureCategory::Server,
    }
}

fn classify_transport(error: &reqwest::Error) -> FailureCategory {
    if let Some(status) = error.status() {
        return classify_http_status(status.as_u16());
    }
    if error.is_connect()
        || error.is_timeout()
        || error.is_body()
        || error.is_decode()
        || error.is_request()
    {
        FailureCategory::Network
    } else {
        FailureCategory::Unknown
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn state(attempt: u32, consecutive_failures: u32) -> FailureState {
        FailureState {
            attempt,
            max_retries: 3,
            consecutive_failures,
            range_supported: true,
        }
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify_size_limit_fatal() {
        let error = DownloadError::size_limit("http://example.com", 10);
        assert_eq!(classify_error(&error), FailureCategory::Fatal);
    }

    #[test]
    fn test_classify_timeout_network() {
        let error = DownloadError::timeout("http://example.com", Duration::from_secs(91));
        assert_eq!(classify_error(&error), FailureCategory::Network);
    }

    #[test]
    fn test_classify_stalled_network() {
        let error = DownloadError::stalled("http://example.com", 3);
        assert_eq!(classify_error(&error), FailureCategory::Network);
    }

    #[test]
    fn test_classify_http_401_403_404_fatal() {
        for status in [401, 403, 404] {
            let error = DownloadError::http_status("http://example.com", status);
            assert_eq!(
                classify_error(&error),
                FailureCategory::Fatal,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_classify_http_5xx_server() {
        for status in [500, 502, 503, 504, 599] {
            let error = DownloadError::http_status("http://example.com", status);
            assert_eq!(
                classify_error(&error),
                FailureCategory::Server,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_classify_other_statuses_server() {
        for status in [400, 408, 410, 416, 429, 302] {
            let error = DownloadError::http_status("http://example.com", status);
            assert_eq!(
                classify_error(&error),
                FailureCategory::Server,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_classify_integrity_server() {
        let error = DownloadError::integrity("/tmp/x", 10, 9);
        assert_eq!(classify_error(&error), FailureCategory::Server);
        let error = DownloadError::unexpected_range("http://example.com", 2048, 0);
        assert_eq!(classify_error(&error), FailureCategory::Server);
    }

    #[test]
    fn test_classify_invalid_url_fatal() {
        let error = DownloadError::invalid_url("not-a-url");
        assert_eq!(classify_error(&error), FailureCategory::Fatal);
    }

    #[test]
    fn test_classify_io_unknown() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DownloadError::io("/path/to/file", io_err);
        assert_eq!(classify_error(&error), FailureCategory::Unknown);
    }

    #[tokio::test]
    async fn test_classify_connection_refused_network() {
        let source = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();
        let error = DownloadError::network("http://127.0.0.1:9/", source);
        assert_eq!(classify_error(&error), FailureCategory::Network);
    }

    // ==================== Backoff Tests ====================

    #[test]
    fn test_backoff_network_first_attempt() {
        let policy = RetryPolicy::default();
        let delay = policy.backoff_delay(0, FailureCategory::Network, 1);
        assert!(
            delay >= Duration::from_millis(1199) && delay <= Duration::from_millis(1201),
            "unexpected delay {delay:?}"
        );
    }

    #[test]
    fn test_backoff_server_second_attempt_repeated() {
        let policy = RetryPolicy::default();
        // 2s * 1.1 * 1.1
        let delay = policy.backoff_delay(1, FailureCategory::Server, 2);
        assert!(
            delay >= Duration::from_millis(2419) && delay <= Duration::from_millis(2421),
            "unexpected delay {delay:?}"
        );
    }

    #[test]
    fn test_backoff_unknown_is_neutral() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_delay(1, FailureCategory::Unknown, 1),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_backoff_clamps_to_last_table_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_delay(2, FailureCategory::Unknown, 1),
            policy.backoff_delay(9, FailureCategory::Unknown, 1)
        );
    }

    #[test]
    fn test_backoff_respects_max_delay() {
        let policy = RetryPolicy::new(
            vec![Duration::from_secs(30)],
            Duration::from_secs(8),
            Duration::from_secs(1),
        );
        assert_eq!(
            policy.backoff_delay(0, FailureCategory::Network, 5),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_backoff_respects_min_delay() {
        let policy = RetryPolicy::new(
            vec![Duration::from_millis(100)],
            Duration::from_secs(8),
            Duration::from_secs(1),
        );
        assert_eq!(
            policy.backoff_delay(0, FailureCategory::Unknown, 1),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_backoff_non_decreasing_then_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<Duration> = (0..6)
            .map(|attempt| policy.backoff_delay(attempt, FailureCategory::Server, attempt + 1))
            .collect();
        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1], "delays decreased: {delays:?}");
        }
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(8)));
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate();
        assert_eq!(
            policy.backoff_delay(5, FailureCategory::Network, 4),
            Duration::ZERO
        );
    }

    // ==================== Decision Tests ====================

    #[test]
    fn test_should_retry_fatal_does_not_retry() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureCategory::Fatal, &state(0, 1));
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
        if let RetryDecision::DoNotRetry { reason } = decision {
            assert!(reason.contains("fatal"));
        }
    }

    #[test]
    fn test_should_retry_network_reprobes() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureCategory::Network, &state(0, 1));
        assert!(matches!(
            decision,
            RetryDecision::Retry {
                reprobe: true,
                cleanup: false,
                ..
            }
        ));
    }

    #[test]
    fn test_should_retry_server_keeps_partial() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureCategory::Server, &state(1, 2));
        assert!(matches!(
            decision,
            RetryDecision::Retry {
                reprobe: false,
                cleanup: false,
                ..
            }
        ));
    }

    #[test]
    fn test_should_retry_respects_max_retries() {
        let policy = RetryPolicy::default();
        for attempt in 0..3 {
            let decision = policy.should_retry(FailureCategory::Server, &state(attempt, 1));
            assert!(matches!(decision, RetryDecision::Retry { .. }));
        }
        let decision = policy.should_retry(FailureCategory::Server, &state(3, 1));
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
        if let RetryDecision::DoNotRetry { reason } = decision {
            assert!(reason.contains("exhausted"));
        }
    }

    #[test]
    fn test_should_retry_at_max_counter_does_not_overflow() {
        let policy = RetryPolicy::default();
        let state = FailureState {
            attempt: u32::MAX,
            max_retries: u32::MAX,
            consecutive_failures: u32::MAX,
            range_supported: true,
        };
        let decision = policy.should_retry(FailureCategory::Server, &state);
        match decision {
            RetryDecision::DoNotRetry { reason } => {
                assert!(reason.contains(&u32::MAX.to_string()), "reason: {reason}");
            }
            RetryDecision::Retry { .. } => panic!("retries should be exhausted"),
        }
    }

    #[test]
    fn test_should_retry_unknown_retries() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureCategory::Unknown, &state(0, 1));
        assert!(matches!(decision, RetryDecision::Retry { reprobe: false, .. }));
    }

    // ==================== Cleanup / Resume Tests ====================

    #[test]
    fn test_should_cleanup_rules() {
        assert!(should_cleanup(FailureCategory::Fatal, true, 1));
        assert!(should_cleanup(FailureCategory::Network, false, 1));
        assert!(should_cleanup(FailureCategory::Server, true, 3));
        assert!(!should_cleanup(FailureCategory::Network, true, 2));
        assert!(!should_cleanup(FailureCategory::Unknown, true, 1));
    }

    #[test]
    fn test_should_resume_when_all_conditions_hold() {
        assert!(should_resume(true, 4096, 1024, 1, 1));
        assert!(should_resume(true, 1024, 1024, 2, 2));
    }

    #[test]
    fn test_should_resume_disabled_without_range_support() {
        assert!(!should_resume(false, 4096, 1024, 1, 1));
    }

    #[test]
    fn test_should_resume_disabled_for_small_partial() {
        assert!(!should_resume(true, 1023, 1024, 1, 1));
    }

    #[test]
    fn test_should_resume_disabled_on_first_attempt() {
        assert!(!should_resume(true, 4096, 1024, 0, 0));
    }

    #[test]
    fn test_should_resume_disabled_after_repeated_failures() {
        assert!(!should_resume(true, 4096, 1024, 3, 3));
    }

    #[test]
    fn test_default_max_retries_constant() {
        assert_eq!(DEFAULT_MAX_RETRIES, 3);
    }
}
