//! Progress notifications emitted by the chunk loop.

use tracing::info;

/// Snapshot of a transfer in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Bytes on disk, including bytes carried over from a resumed partial.
    pub bytes: u64,
    /// `bytes` as a percentage of the size ceiling.
    pub percent_of_limit: f64,
    /// Bytes transferred by this attempt divided by its elapsed time.
    pub bytes_per_sec: f64,
}

impl ProgressUpdate {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn new(bytes: u64, limit: u64, attempt_bytes: u64, elapsed_secs: f64) -> Self {
        let percent_of_limit = if limit > 0 {
            bytes as f64 / limit as f64 * 100.0
        } else {
            0.0
        };
        let bytes_per_sec = if elapsed_secs > 0.0 {
            attempt_bytes as f64 / elapsed_secs
        } else {
            0.0
        };
        Self {
            bytes,
            percent_of_limit,
            bytes_per_sec,
        }
    }
}

/// Receives progress notifications. One-way: observers cannot steer the transfer.
pub trait ProgressObserver: Send + Sync {
    /// Called at most once per progress interval while data is flowing.
    fn on_progress(&self, url: &str, update: &ProgressUpdate);
}

/// Default observer that reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    #[allow(clippy::cast_precision_loss)]
    fn on_progress(&self, url: &str, update: &ProgressUpdate) {
        info!(
            url,
            mb = %format!("{:.1}", update.bytes as f64 / 1024.0 / 1024.0),
            percent = %format!("{:.1}", update.percent_of_limit),
            mb_per_sec = %format!("{:.2}", update.bytes_per_sec / 1024.0 / 1024.0),
            "download progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_update_percent_and_throughput() {
        let update = ProgressUpdate::new(512, 1024, 256, 2.0);
        assert_eq!(update.bytes, 512);
        assert!((update.percent_of_limit - 50.0).abs() < f64::EPSILON);
        assert!((update.bytes_per_sec - 128.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_update_zero_limit_and_elapsed() {
        let update = ProgressUpdate::new(10, 0, 10, 0.0);
        assert!(update.percent_of_limit.abs() < f64::EPSILON);
        assert!(update.bytes_per_sec.abs() < f64::EPSILON);
    }
}
