//! Adaptive timeout planning.
//!
//! Connect, read and chunk-stall timeouts scale with the measured
//! [`NetworkQuality`]; the total budget is always the caller's value.

use std::time::Duration;

use super::constants::{
    CHUNK_STALL_TIMEOUT_SECS, CONNECT_TIMEOUT_SECS, MIN_CHUNK_STALL_TIMEOUT_SECS,
    MIN_CONNECT_TIMEOUT_SECS, MIN_READ_TIMEOUT_SECS, READ_TIMEOUT_SECS,
};
use super::probe::NetworkQuality;

/// Timeouts used by one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPlan {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Socket read inactivity timeout.
    pub read: Duration,
    /// Hard ceiling for a whole transfer. Never scaled.
    pub total: Duration,
    /// Window after which a missing chunk counts as a stall.
    pub chunk_stall: Duration,
}

/// Per-quality multipliers for (connect, read, chunk-stall).
fn multipliers(quality: NetworkQuality) -> (f64, f64, f64) {
    match quality {
        NetworkQuality::Good => (0.8, 0.8, 0.7),
        NetworkQuality::Medium => (1.0, 1.0, 1.0),
        NetworkQuality::Poor => (1.3, 1.2, 1.5),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_secs(base_secs: u64, multiplier: f64, floor_secs: u64) -> Duration {
    // Whole seconds, truncated like the base values themselves.
    let scaled = (base_secs as f64 * multiplier) as u64;
    Duration::from_secs(scaled.max(floor_secs))
}

impl TimeoutPlan {
    /// Derives a plan from a quality tier and the caller's total budget.
    #[must_use]
    pub fn plan(quality: NetworkQuality, total: Duration) -> Self {
        let (connect, read, chunk) = multipliers(quality);
        Self {
            connect: scaled_secs(CONNECT_TIMEOUT_SECS, connect, MIN_CONNECT_TIMEOUT_SECS),
            read: scaled_secs(READ_TIMEOUT_SECS, read, MIN_READ_TIMEOUT_SECS),
            total,
            chunk_stall: scaled_secs(CHUNK_STALL_TIMEOUT_SECS, chunk, MIN_CHUNK_STALL_TIMEOUT_SECS),
        }
    }
}
