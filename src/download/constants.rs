//! Constants for the download module (timeouts, thresholds, limits).

use std::time::Duration;

/// Default byte-size ceiling for a single fetch (200 MiB).
pub const DEFAULT_SIZE_LIMIT: u64 = 200 * 1024 * 1024;

/// Default total time budget for one transfer (90 seconds).
pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(90);

/// Base HTTP connect timeout before quality scaling (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Base HTTP read timeout before quality scaling (15 seconds).
pub const READ_TIMEOUT_SECS: u64 = 15;

/// Base chunk-stall timeout before quality scaling (10 seconds).
pub const CHUNK_STALL_TIMEOUT_SECS: u64 = 10;

/// Floors applied after quality scaling.
pub const MIN_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const MIN_READ_TIMEOUT_SECS: u64 = 8;
pub const MIN_CHUNK_STALL_TIMEOUT_SECS: u64 = 5;

/// Probe client timeouts (connect, read).
pub const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const PROBE_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Origin round-trip below this is `good`.
pub const NETWORK_GOOD_THRESHOLD: Duration = Duration::from_millis(500);

/// Origin round-trip below this is `medium`; anything slower is `poor`.
pub const NETWORK_MEDIUM_THRESHOLD: Duration = Duration::from_secs(2);

/// Extra HEAD attempts when checking range support.
pub const RANGE_CHECK_RETRIES: u32 = 2;

/// Pause between range-support HEAD attempts and connection re-tries.
pub const CONNECTION_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Write buffer size for the chunk loop (32 KiB).
pub const CHUNK_SIZE: usize = 32 * 1024;

/// A partial file shorter than this is discarded instead of resumed.
pub const MIN_PARTIAL_SIZE: u64 = 1024;

/// Consecutive stall windows that abort a transfer.
pub const MAX_CONSECUTIVE_STALLS: u32 = 3;

/// Minimum spacing between progress notifications.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(15);
