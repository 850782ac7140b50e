//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use podcatcher::config::{FileConfig, MAX_RATE_LIMIT_MS, MAX_RETRIES_LIMIT};
use podcatcher::download::{DEFAULT_MAX_RETRIES, RetryPolicy};
use podcatcher::pipeline::{DEFAULT_WORKERS, PipelineConfig, WindowOptions};

/// Connect timeout when neither flag nor config sets one.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout when neither flag nor config sets one.
const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Download complete podcasts from OPML subscription lists.
///
/// Every feed listed in the OPML document is fetched and each episode's
/// enclosure is saved under `<dir>/<show>/<title> [<date>].<ext>`.
/// Episodes already on disk are skipped.
#[derive(Parser, Debug)]
#[command(name = "podcatcher")]
#[command(author, version, about)]
pub struct Args {
    /// Path or URL to the OPML file listing the podcasts
    #[arg(value_name = "OPML")]
    pub opml: String,

    /// Directory to save downloads in (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Download at most N episodes per feed
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Skip the first N episodes of each feed
    #[arg(long, value_name = "N")]
    pub skip: Option<usize>,

    /// Process episodes oldest first (applied before --skip and --limit)
    #[arg(long)]
    pub reverse: bool,

    /// Only download episodes newer than N days
    #[arg(long, value_name = "N")]
    pub max_age_days: Option<u32>,

    /// Delete the contents of the download directory before downloading
    #[arg(short, long)]
    pub reset: bool,

    /// Concurrent workers (1-64)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub workers: Option<u8>,

    /// Soft limit on queued tasks (unbounded when omitted)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_capacity: Option<u64>,

    /// Retries for transient failures, per request (0-10)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: Option<u32>,

    /// Minimum delay between requests to the same host in milliseconds (0 to disable, max 60000)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Configuration file (default: $XDG_CONFIG_HOME/podcatcher/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Write log output to FILE instead of the terminal
    #[arg(short, long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

/// Effective settings after merging flags, config file and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Args {
    /// Log level used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// Merges flags over `file` over built-in defaults.
    #[must_use]
    pub fn resolve(&self, file: &FileConfig) -> Settings {
        let download_root = self
            .dir
            .clone()
            .or_else(|| file.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let workers = self
            .workers
            .map(usize::from)
            .or(file.workers)
            .unwrap_or(DEFAULT_WORKERS);

        let queue_capacity = self
            .queue_capacity
            .and_then(|c| usize::try_from(c).ok())
            .or(file.queue_capacity);

        let max_retries = self
            .max_retries
            .or(file.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES)
            .min(MAX_RETRIES_LIMIT);
        let retry = RetryPolicy::with_max_attempts(max_retries + 1);

        let rate_limit_ms = self
            .rate_limit
            .or(file.rate_limit)
            .unwrap_or(0)
            .min(MAX_RATE_LIMIT_MS);

        let mut pipeline = PipelineConfig::new(download_root);
        pipeline.workers = workers;
        pipeline.queue_capacity = queue_capacity;
        pipeline.window = WindowOptions {
            reverse: self.reverse,
            skip: self.skip,
            limit: self.limit,
            max_age_days: self.max_age_days,
        };
        pipeline.feed_retry = retry.clone();
        pipeline.enclosure_retry = retry;
        pipeline.rate_limit = Duration::from_millis(rate_limit_ms);

        Settings {
            pipeline,
            connect_timeout_secs: file
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}
