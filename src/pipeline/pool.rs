//! Worker pool driving the discovery-and-download pipeline.
//!
//! # Concurrency Model
//!
//! - `workers` tokio tasks share one [`TaskQueue`] and one [`DedupGuard`]
//! - Each worker loops on `get`, dispatches on the task kind, and always
//!   `ack`s, whether the handler succeeded, failed or panicked
//! - A feed task enqueues its episodes before it is acked, so the queue's
//!   outstanding count cannot reach zero while discovery is pending
//! - The driver awaits `join`, then closes the queue; workers exit at their
//!   next `get`

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use super::PipelineConfig;
use super::enclosure::{EnclosureOutcome, fetch_enclosure};
use super::feed::discover;
use super::guard::DedupGuard;
use super::queue::TaskQueue;
use crate::download::{HttpClient, RateLimiter};
use crate::model::{Item, Source, Task};

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 64;

/// Worker count when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Invalid pipeline settings.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    /// Worker count outside the supported range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
    },

    /// A bounded queue needs room for at least one task.
    #[error("invalid queue capacity {value}: must be at least 1")]
    InvalidQueueCapacity {
        /// The rejected value.
        value: usize,
    },
}

/// Counters for one pipeline run.
///
/// Updated concurrently by the workers with atomic increments.
#[derive(Debug, Default)]
pub struct RunStats {
    feeds_fetched: AtomicUsize,
    feeds_failed: AtomicUsize,
    items_dropped: AtomicUsize,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    panicked: AtomicUsize,
}

impl RunStats {
    /// Creates a zeroed tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds fetched and parsed.
    #[must_use]
    pub fn feeds_fetched(&self) -> usize {
        self.feeds_fetched.load(Ordering::SeqCst)
    }

    /// Feeds that produced no items because of a fetch or parse error or a panic.
    #[must_use]
    pub fn feeds_failed(&self) -> usize {
        self.feeds_failed.load(Ordering::SeqCst)
    }

    /// Feed entries dropped for missing or malformed fields.
    #[must_use]
    pub fn items_dropped(&self) -> usize {
        self.items_dropped.load(Ordering::SeqCst)
    }

    /// Enclosures written.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Enclosures already on disk.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Enclosures that failed after all attempts, or whose handler panicked.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Extra attempts made across feeds and enclosures.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Tasks whose handler panicked.
    #[must_use]
    pub fn panicked(&self) -> usize {
        self.panicked.load(Ordering::SeqCst)
    }

    fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::SeqCst);
    }

    fn add_retries(&self, attempts: u32) {
        let extra = attempts.saturating_sub(1) as usize;
        if extra > 0 {
            Self::add(&self.retried, extra);
        }
    }

    /// A panicked handler counts as a failure of its task kind too.
    fn record_panic(&self, task: &Task) {
        Self::add(&self.panicked, 1);
        match task {
            Task::Feed(_) => Self::add(&self.feeds_failed, 1),
            Task::Episode(_) => Self::add(&self.failed, 1),
        }
    }

    fn snapshot(&self) -> Self {
        let copy = |c: &AtomicUsize| AtomicUsize::new(c.load(Ordering::SeqCst));
        Self {
            feeds_fetched: copy(&self.feeds_fetched),
            feeds_failed: copy(&self.feeds_failed),
            items_dropped: copy(&self.items_dropped),
            downloaded: copy(&self.downloaded),
            skipped: copy(&self.skipped),
            failed: copy(&self.failed),
            retried: copy(&self.retried),
            panicked: copy(&self.panicked),
        }
    }
}

/// Run-scoped state shared by every worker.
#[derive(Debug)]
struct Shared {
    config: PipelineConfig,
    client: HttpClient,
    rate_limiter: Arc<RateLimiter>,
    guard: DedupGuard,
    queue: TaskQueue,
    stats: Arc<RunStats>,
}

impl Shared {
    async fn handle(&self, task: &Task) {
        match task {
            Task::Feed(source) => self.process_feed(source).await,
            Task::Episode(item) => self.process_episode(item).await,
        }
    }

    async fn process_feed(&self, source: &Arc<Source>) {
        let result = discover(
            &self.client,
            &self.rate_limiter,
            &self.config.feed_retry,
            &self.config.window,
            source,
        )
        .await;

        let discovery = match result {
            Ok(discovery) => discovery,
            Err(e) => {
                warn!(source = %source, error = %e, "feed failed, no episodes scheduled");
                RunStats::add(&self.stats.feeds_failed, 1);
                return;
            }
        };

        RunStats::add(&self.stats.feeds_fetched, 1);
        RunStats::add(&self.stats.items_dropped, discovery.dropped);
        self.stats.add_retries(discovery.attempts);

        let found = discovery.items.len();
        let admitted = self.guard.admit(
            discovery
                .items
                .into_iter()
                .map(|item| Task::Episode(Arc::new(item))),
        );
        info!(source = %source, found, scheduled = admitted.len(), "feed processed");

        for task in admitted {
            self.queue.put(task).await;
        }
    }

    async fn process_episode(&self, item: &Arc<Item>) {
        let result = fetch_enclosure(
            &self.client,
            &self.rate_limiter,
            &self.config.enclosure_retry,
            &self.config.download_root,
            item,
        )
        .await;

        match result {
            Ok((EnclosureOutcome::Downloaded { path, bytes }, attempts)) => {
                info!(episode = %item, path = %path.display(), bytes, attempts, "downloaded");
                RunStats::add(&self.stats.downloaded, 1);
                self.stats.add_retries(attempts);
            }
            Ok((EnclosureOutcome::Skipped(path), _)) => {
                info!(episode = %item, path = %path.display(), "already downloaded, skipping");
                RunStats::add(&self.stats.skipped, 1);
            }
            Err(e) => {
                warn!(episode = %item, url = %item.enclosure_url, error = %e, "download failed");
                RunStats::add(&self.stats.failed, 1);
            }
        }
    }
}

/// Fixed-size worker pool over a shared task queue.
///
/// # Example
///
/// ```no_run
/// use podcatcher::download::HttpClient;
/// use podcatcher::model::Source;
/// use podcatcher::pipeline::{Pipeline, PipelineConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::new("./podcasts");
/// let pipeline = Pipeline::new(config, HttpClient::new())?;
/// let source = Source::new("rss", "Show", "Show", None, "https://example.com/feed.xml");
/// let stats = pipeline.run(vec![source]).await;
/// println!("downloaded {}", stats.downloaded());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    client: HttpClient,
    rate_limiter: Arc<RateLimiter>,
}

impl Pipeline {
    /// Validates `config` and prepares a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] when the worker count is outside
    /// `MIN_WORKERS..=MAX_WORKERS` or the queue capacity is zero.
    #[instrument(level = "debug", skip_all)]
    pub fn new(config: PipelineConfig, client: HttpClient) -> Result<Self, PoolError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&config.workers) {
            return Err(PoolError::InvalidWorkers {
                value: config.workers,
            });
        }
        if config.queue_capacity == Some(0) {
            return Err(PoolError::InvalidQueueCapacity { value: 0 });
        }

        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit));
        debug!(
            workers = config.workers,
            queue_capacity = ?config.queue_capacity,
            feed_attempts = config.feed_retry.max_attempts(),
            enclosure_attempts = config.enclosure_retry.max_attempts(),
            rate_limit_ms = rate_limiter.default_delay().as_millis(),
            "creating pipeline"
        );

        Ok(Self {
            config,
            client,
            rate_limiter,
        })
    }

    /// Configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Processes every source until no work remains.
    ///
    /// Individual feed or download failures never abort the run; they are
    /// logged and counted in the returned [`RunStats`].
    #[instrument(skip_all, fields(root = %self.config.download_root.display(), sources = sources.len()))]
    pub async fn run(&self, sources: Vec<Source>) -> RunStats {
        let workers = self.config.workers;
        let queue = match self.config.queue_capacity {
            Some(capacity) => TaskQueue::bounded(capacity, workers),
            None => TaskQueue::unbounded(),
        };
        let stats = Arc::new(RunStats::new());
        let shared = Arc::new(Shared {
            config: self.config.clone(),
            client: self.client.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            guard: DedupGuard::new(),
            queue,
            stats: Arc::clone(&stats),
        });

        info!(workers, "starting pipeline");

        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(worker(id, Arc::clone(&shared))))
            .collect();

        let seeds = shared
            .guard
            .admit(sources.into_iter().map(|s| Task::Feed(Arc::new(s))));
        debug!(feeds = seeds.len(), "seeding queue");
        for task in seeds {
            shared.queue.seed(task).await;
        }

        shared.queue.join().await;
        shared.queue.close();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        let scheduled = shared.guard.seen_count();
        drop(shared);

        let stats = Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot());
        info!(
            scheduled,
            feeds = stats.feeds_fetched(),
            feeds_failed = stats.feeds_failed(),
            downloaded = stats.downloaded(),
            skipped = stats.skipped(),
            failed = stats.failed(),
            retried = stats.retried(),
            "pipeline finished"
        );
        stats
    }
}

async fn worker(id: usize, shared: Arc<Shared>) {
    debug!(worker = id, "worker started");
    while let Some(task) = shared.queue.get().await {
        debug!(worker = id, kind = task.kind(), task = %task, "picked task");
        if let Err(message) = run_isolated(shared.handle(&task)).await {
            error!(worker = id, task = %task, panic = %message, "task panicked");
            shared.stats.record_panic(&task);
        }
        shared.queue.ack();
    }
    debug!(worker = id, "worker stopped");
}

/// Runs `fut` to completion, turning a panic into its message.
async fn run_isolated<F>(fut: F) -> Result<(), String>
where
    F: Future<Output = ()>,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
