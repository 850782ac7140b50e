//! Podcatcher core library
//!
//! Downloads complete podcasts listed in an OPML subscription file. Feeds and
//! episode enclosures are processed by a fixed pool of workers draining one
//! shared task queue.
//!
//! # Architecture
//!
//! - [`opml`] - Subscription list parsing into [`model::Source`]s
//! - [`model`] - Sources, episodes and the queue's task type
//! - [`download`] - HTTP client, retry, per-host pacing, filename derivation
//! - [`pipeline`] - Dedup guard, task queue, feed and enclosure fetchers,
//!   worker pool
//! - [`storage`] - Download directory reset and orphaned temp-file sweep
//! - [`config`] - Optional TOML defaults for command-line options

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod model;
pub mod opml;
pub mod pipeline;
pub mod storage;
mod user_agent;

// Re-export commonly used types
pub use download::{
    DEFAULT_MAX_RETRIES, EnclosureError, FailureType, FetchError, HttpClient, RateLimiter,
    RetryDecision, RetryPolicy, classify_error,
};
pub use model::{Item, Source, Task};
pub use crate::opml::{OpmlError, load_sources};
pub use pipeline::{
    DEFAULT_WORKERS, FeedError, ItemError, Pipeline, PipelineConfig, PoolError, RunStats,
    WindowOptions,
};
