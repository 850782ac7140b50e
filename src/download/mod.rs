//! HTTP plumbing shared by the pipeline: client, errors, retry, pacing,
//! and episode filename derivation.
//!
//! # Example
//!
//! ```no_run
//! use podcatcher::download::{HttpClient, RateLimiter, RetryPolicy, with_retry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let limiter = RateLimiter::new(Duration::from_millis(250));
//! let url = "https://example.com/feed.xml";
//! let (body, attempts) = with_retry(&RetryPolicy::default(), &limiter, url, || {
//!     client.fetch_bytes(url)
//! })
//! .await
//! .map_err(|(e, _)| e)?;
//! println!("{} bytes after {attempts} attempt(s)", body.len());
//! # Ok(())
//! # }
//! ```

mod client;
pub(crate) mod constants;
mod error;
mod filename;
pub mod rate_limiter;
mod retry;

pub use client::HttpClient;
pub use constants::{FALLBACK_EXTENSION, TEMP_FILE_SUFFIX};
pub use error::{EnclosureError, FetchError};
pub use filename::{
    EpisodeFilename, extension_for_mime, is_temp_file, sanitize_filename, temp_file_name,
};
pub use rate_limiter::{RateLimiter, extract_host, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, Retryable, classify_error,
    with_retry,
};
