//! Concurrent discovery-and-download pipeline.
//!
//! Feed tasks fetch and parse a source, then schedule its episodes; episode
//! tasks download one enclosure each. Both kinds share one [`TaskQueue`]
//! drained by a fixed [`Pipeline`] of workers, and every task passes the
//! [`DedupGuard`] exactly once before it is enqueued.

use std::path::PathBuf;
use std::time::Duration;

use crate::download::RetryPolicy;

pub mod enclosure;
pub mod feed;
pub mod guard;
pub mod pool;
pub mod queue;

pub use enclosure::{EnclosureOutcome, fetch_enclosure};
pub use feed::{Discovery, FeedError, ItemError, WindowOptions, apply_window, discover, parse_feed};
pub use guard::DedupGuard;
pub use pool::{DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS, Pipeline, PoolError, RunStats};
pub use queue::TaskQueue;

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory that receives one subdirectory per source.
    pub download_root: PathBuf,
    /// Concurrent workers.
    pub workers: usize,
    /// Soft limit on pending tasks; `None` for an unbounded queue.
    pub queue_capacity: Option<usize>,
    /// Which episodes of each feed to schedule.
    pub window: WindowOptions,
    /// Retry policy for feed documents.
    pub feed_retry: RetryPolicy,
    /// Retry policy for enclosures.
    pub enclosure_retry: RetryPolicy,
    /// Minimum delay between requests to one host; zero disables pacing.
    pub rate_limit: Duration,
}

impl PipelineConfig {
    /// Defaults: [`DEFAULT_WORKERS`] workers, unbounded queue, no window,
    /// default retry policies, no pacing.
    pub fn new(download_root: impl Into<PathBuf>) -> Self {
        Self {
            download_root: download_root.into(),
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            window: WindowOptions::default(),
            feed_retry: RetryPolicy::default(),
            enclosure_retry: RetryPolicy::default(),
            rate_limit: Duration::ZERO,
        }
    }
}
