//! HTTP client wrapper shared by the feed and enclosure fetchers.
//!
//! One [`HttpClient`] is built per run and cloned into every worker so all
//! requests share a connection pool. Redirects are followed; any non-2xx
//! final status becomes [`FetchError::HttpStatus`].

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, redirect};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, MAX_REDIRECTS, READ_TIMEOUT_SECS};
use super::error::FetchError;
use crate::user_agent;

/// HTTP client for feed documents and streamed enclosures.
///
/// # Example
///
/// ```no_run
/// use podcatcher::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let body = client.fetch_bytes("https://example.com/feed.xml").await?;
/// println!("{} bytes", body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default timeouts (30s connect, 5min idle read).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// `read_timeout_secs` bounds the idle gap between reads, not the whole
    /// transfer, so a slow but steady enclosure never times out.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied timeouts.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a GET and returns the response once its status is known to be 2xx.
    ///
    /// The body is left unread so enclosures can be streamed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] for unparseable or non-HTTP URLs
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] on transport failure
    /// - [`FetchError::HttpStatus`] for a non-2xx final status
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(FetchError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        if response.url().as_str() != url {
            debug!(final_url = %response.url(), "followed redirect");
        }

        Ok(response)
    }

    /// Fetches a whole (small) document, e.g. a feed or an OPML file.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`FetchError::Network`] if the body
    /// cannot be read.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(url, e))?;
        Ok(body.to_vec())
    }
}

fn validate_url(url: &str) -> Result<(), FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(FetchError::invalid_url(url))
    }
}
