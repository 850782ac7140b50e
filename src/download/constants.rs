//! Constants for the download module (timeouts, pacing, filenames).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes without receiving any bytes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Maximum number of redirects followed for feeds and enclosures.
pub const MAX_REDIRECTS: usize = 10;

/// Warning threshold for cumulative pacing delay per host (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Suffix of in-flight temporary files; the sweep at startup removes leftovers.
pub const TEMP_FILE_SUFFIX: &str = ".part";

/// Extension used when neither the feed nor the response names a known type.
pub const FALLBACK_EXTENSION: &str = ".bin";
