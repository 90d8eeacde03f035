//! Progress UI (spinner) for a fetch run.

use std::time::Duration;

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use mediafetch_core::{ProgressObserver, ProgressUpdate};

/// Spinner that renders progress notifications on stderr.
#[derive(Debug)]
pub(crate) struct SpinnerProgress {
    spinner: ProgressBar,
}

impl SpinnerProgress {
    /// Starts a ticking spinner for `url`.
    pub(crate) fn start(url: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(format!("Connecting to {url}..."));
        Self { spinner }
    }

    /// Removes the spinner from the terminal.
    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressObserver for SpinnerProgress {
    fn on_progress(&self, _url: &str, update: &ProgressUpdate) {
        self.spinner.set_message(format_update(update));
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_update(update: &ProgressUpdate) -> String {
    format!(
        "Downloading {} ({:.1}% of limit) at {}/s",
        HumanBytes(update.bytes),
        update.percent_of_limit,
        HumanBytes(update.bytes_per_sec.max(0.0) as u64),
    )
}
