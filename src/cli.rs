//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download one media file over an unreliable network.
///
/// Mediafetch probes the origin, adapts its timeouts, resumes interrupted
/// transfers where the server allows it and verifies the final size.
#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the media file to download
    pub url: String,

    /// Directory to save the file into (default: current directory)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum file size in MiB (1-102400, default 200)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=102_400))]
    pub limit_mb: Option<u64>,

    /// Per-attempt total timeout in seconds (1-3600, default 90)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Retries after the first attempt (0-10, default 3)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Read defaults from this config file instead of the standard location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
