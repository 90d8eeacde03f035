//! Tunables for probing, streaming and retrying.
//!
//! [`FetchConfig::default`] reproduces the production values from
//! [`constants`](super::constants). Tests shrink the delays.

use std::time::Duration;

use super::constants::{
    CHUNK_SIZE, CONNECTION_RETRY_DELAY, MAX_CONSECUTIVE_STALLS, MIN_PARTIAL_SIZE,
    NETWORK_GOOD_THRESHOLD, NETWORK_MEDIUM_THRESHOLD, PROBE_CONNECT_TIMEOUT, PROBE_READ_TIMEOUT,
    PROGRESS_INTERVAL, RANGE_CHECK_RETRIES,
};
use super::retry::RetryPolicy;

/// Fetch behavior that is fixed for the lifetime of a [`Fetcher`](super::Fetcher).
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Connect timeout of the latency probe.
    pub probe_connect_timeout: Duration,
    /// Read timeout of the latency probe.
    pub probe_read_timeout: Duration,
    /// Round trips below this are `good`.
    pub good_threshold: Duration,
    /// Round trips below this are `medium`.
    pub medium_threshold: Duration,
    /// Extra HEAD attempts for the range-support check.
    pub range_check_retries: u32,
    /// Pause between range checks and between connection re-tries.
    pub connection_retry_delay: Duration,
    /// Write buffer capacity for the chunk loop.
    pub chunk_size: usize,
    /// Partial files shorter than this are never resumed.
    pub min_partial_size: u64,
    /// Consecutive stall windows that abort a transfer.
    pub max_consecutive_stalls: u32,
    /// Minimum spacing between progress notifications.
    pub progress_interval: Duration,
    /// Backoff schedule between attempts.
    pub retry_policy: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            probe_connect_timeout: PROBE_CONNECT_TIMEOUT,
            probe_read_timeout: PROBE_READ_TIMEOUT,
            good_threshold: NETWORK_GOOD_THRESHOLD,
            medium_threshold: NETWORK_MEDIUM_THRESHOLD,
            range_check_retries: RANGE_CHECK_RETRIES,
            connection_retry_delay: CONNECTION_RETRY_DELAY,
            chunk_size: CHUNK_SIZE,
            min_partial_size: MIN_PARTIAL_SIZE,
            max_consecutive_stalls: MAX_CONSECUTIVE_STALLS,
            progress_interval: PROGRESS_INTERVAL,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl FetchConfig {
    /// Returns a copy with a different retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns a copy with a different delay between connection re-tries.
    #[must_use]
    pub fn with_connection_retry_delay(mut self, delay: Duration) -> Self {
        self.connection_retry_delay = delay;
        self
    }
}
