//! Error types for network fetches and enclosure writes.
//!
//! Every variant carries the URL or path it concerns so a single log line is
//! enough to tell which feed or episode failed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while retrieving a feed document or an enclosure over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The provided URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status code when the server answered with one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while downloading one enclosure to disk.
#[derive(Debug, Error)]
pub enum EnclosureError {
    /// Fetching the payload failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Directory creation, temp file write, sync or rename failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl EnclosureError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// `FetchError` does not implement `From<reqwest::Error>` and `EnclosureError`
// does not implement `From<std::io::Error>`: both variants need the URL or path
// that the source error lacks, so callers go through the constructors above.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_timeout_display() {
        let error = FetchError::timeout("https://example.com/feed.xml");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/feed.xml"));
    }

    #[test]
    fn test_fetch_error_http_status_display() {
        let error = FetchError::http_status("https://example.com/feed.xml", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/feed.xml"),
            "Expected URL in: {msg}"
        );
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_fetch_error_invalid_url_has_no_status() {
        let error = FetchError::invalid_url("not-a-url");
        assert!(error.to_string().contains("invalid URL"));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_enclosure_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = EnclosureError::io(PathBuf::from("/tmp/show/episode.mp3"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/show/episode.mp3"), "Expected path in: {msg}");
    }

    #[test]
    fn test_enclosure_error_fetch_is_transparent() {
        let error: EnclosureError = FetchError::http_status("https://cdn.example/ep.mp3", 503).into();
        assert_eq!(error.to_string(), "HTTP 503 fetching https://cdn.example/ep.mp3");
    }
}
