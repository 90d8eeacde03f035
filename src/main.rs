//! CLI entry point for the mediafetch tool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mediafetch_core::download::constants::{DEFAULT_SIZE_LIMIT, DEFAULT_TOTAL_TIMEOUT};
use mediafetch_core::{DEFAULT_MAX_RETRIES, DownloadRequest, Fetcher, classify_error};
use tracing::{debug, info};

mod app_config;
mod cli;
mod progress_ui;

use app_config::{FileConfig, load_file_config};
use cli::Args;
use progress_ui::SpinnerProgress;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let file_config = load_file_config(args.config.as_deref())?.unwrap_or_default();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config file > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file_config
                .verbosity
                .map_or("info", app_config::VerbositySetting::filter_directive),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, ?file_config, "CLI arguments parsed");

    let request = build_request(&args, &file_config);
    info!(
        url = %request.url,
        save_dir = %request.save_dir.display(),
        size_limit = request.size_limit,
        total_timeout_secs = request.total_timeout.as_secs(),
        max_retries = request.max_retries,
        "mediafetch starting"
    );

    let quiet = args.quiet || default_level == "error";
    let spinner = (!quiet).then(|| Arc::new(SpinnerProgress::start(&request.url)));

    let mut fetcher = Fetcher::new();
    if let Some(spinner) = &spinner {
        fetcher = fetcher.with_observer(spinner.clone());
    }

    let result = fetcher.download(&request).await;
    if let Some(spinner) = &spinner {
        spinner.finish();
    }

    let path = match result {
        Ok(path) => path,
        Err(error) => {
            let category = classify_error(&error);
            return Err(error).with_context(|| {
                format!("Failed to download {} ({category} failure)", request.url)
            });
        }
    };

    println!("{}", path.display());
    Ok(())
}

/// Merges CLI flags over file config over built-in defaults.
fn build_request(args: &Args, file: &FileConfig) -> DownloadRequest {
    let save_dir = args
        .output_dir
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let size_limit = args
        .limit_mb
        .or(file.size_limit_mb)
        .map_or(DEFAULT_SIZE_LIMIT, |mb| mb.saturating_mul(BYTES_PER_MB));

    let total_timeout = args
        .timeout
        .or(file.timeout_secs)
        .map_or(DEFAULT_TOTAL_TIMEOUT, Duration::from_secs);

    let max_retries = args
        .max_retries
        .or(file.max_retries)
        .map_or(DEFAULT_MAX_RETRIES, u32::from);

    DownloadRequest::new(args.url.clone(), save_dir)
        .with_size_limit(size_limit)
        .with_total_timeout(total_timeout)
        .with_max_retries(max_retries)
}
