//! User-Agent string sent with every feed and enclosure request.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/podcatcher";

/// Default User-Agent identifying the tool and its version.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("podcatcher/{version} (podcast-downloader; +{PROJECT_UA_URL})")
}
