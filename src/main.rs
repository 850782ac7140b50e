//! CLI entry point for podcatcher.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use podcatcher::config::load_config;
use podcatcher::storage::{remove_orphaned_temp_files, reset_directory};
use podcatcher::{HttpClient, Pipeline, load_sources};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    init_tracing(&args)?;

    debug!(?args, "CLI arguments parsed");
    info!("Podcatcher starting");

    let loaded = load_config(args.config.as_deref())?;
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "loaded config file");
    }
    let settings = args.resolve(&loaded.config);
    let root = settings.pipeline.download_root.clone();

    tokio::fs::create_dir_all(&root)
        .await
        .with_context(|| format!("Failed to create download directory '{}'", root.display()))?;
    if args.reset {
        reset_directory(&root)
            .await
            .with_context(|| format!("Failed to reset download directory '{}'", root.display()))?;
    }
    remove_orphaned_temp_files(&root)
        .await
        .with_context(|| format!("Failed to scan download directory '{}'", root.display()))?;

    let client = HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs);
    let sources = load_sources(&args.opml, &client)
        .await
        .with_context(|| format!("Failed to load subscriptions from '{}'", args.opml))?;

    let pipeline = Pipeline::new(settings.pipeline, client)?;
    let stats = pipeline.run(sources).await;

    info!(
        feeds = stats.feeds_fetched(),
        feeds_failed = stats.feeds_failed(),
        downloaded = stats.downloaded(),
        skipped = stats.skipped(),
        failed = stats.failed(),
        dropped = stats.items_dropped(),
        retried = stats.retried(),
        "Download complete"
    );

    Ok(())
}

/// Installs the global subscriber.
///
/// Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_level()));

    match &args.log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}
