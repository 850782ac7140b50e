//! Filename derivation and sanitization for downloaded episodes.
//!
//! The final filename of an episode is a pure function of its feed metadata:
//! `"{title} [{YYYY-MM-DD}]{ext}"`. The same derivation decides whether an
//! episode is already on disk and names the file once the download finishes.

use chrono::Utc;
use rand::Rng;

use super::constants::{FALLBACK_EXTENSION, TEMP_FILE_SUFFIX};
use crate::model::Item;

/// Longest title prefix (in bytes) kept in a filename, leaving room for the
/// date, extension and temp-file decoration under the common 255-byte limit.
const MAX_TITLE_BYTES: usize = 200;

/// Used when a title sanitizes to nothing.
const UNTITLED: &str = "untitled";

/// Mime type → extension table, matched after stripping parameters.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("audio/mpeg", ".mp3"),
    ("audio/mp3", ".mp3"),
    ("audio/x-mpeg", ".mp3"),
    ("audio/ogg", ".ogg"),
    ("application/ogg", ".ogg"),
    ("audio/opus", ".opus"),
    ("audio/mp4", ".m4a"),
    ("audio/m4a", ".m4a"),
    ("audio/x-m4a", ".m4a"),
    ("audio/aac", ".aac"),
    ("audio/x-aac", ".aac"),
    ("audio/flac", ".flac"),
    ("audio/x-flac", ".flac"),
    ("audio/wav", ".wav"),
    ("audio/x-wav", ".wav"),
    ("video/mp4", ".mp4"),
    ("video/x-m4v", ".m4v"),
    ("video/quicktime", ".mov"),
    ("video/webm", ".webm"),
    ("application/pdf", ".pdf"),
];

/// Resolves a file extension (with leading dot) from a mime type or
/// `Content-Type` header value.
///
/// ```
/// use podcatcher::download::extension_for_mime;
///
/// assert_eq!(extension_for_mime("audio/ogg"), Some(".ogg"));
/// assert_eq!(extension_for_mime("Audio/MPEG; charset=binary"), Some(".mp3"));
/// assert_eq!(extension_for_mime("application/octet-stream"), None);
/// ```
#[must_use]
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.split(';').next().unwrap_or("").trim().to_lowercase();
    MIME_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == mime)
        .map(|(_, ext)| *ext)
}

/// Makes a title safe to use as a single path component.
///
/// Path separators become `-`, colons are dropped, control characters are
/// removed, and surrounding whitespace and dots are trimmed.
///
/// ```
/// use podcatcher::download::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Ep 1/2: The Start"), "Ep 1-2 The Start");
/// assert_eq!(sanitize_filename("..."), "untitled");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' => Some('-'),
            ':' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    truncate_on_char_boundary(trimmed, MAX_TITLE_BYTES).to_string()
}

fn truncate_on_char_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].trim_end()
}

/// The derived name of an episode file.
///
/// `extension` is `None` when the feed's mime type is absent or unknown; the
/// enclosure fetcher then resolves it from the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeFilename {
    stem: String,
    extension: Option<&'static str>,
}

impl EpisodeFilename {
    /// Derives the filename of `item`.
    #[must_use]
    pub fn for_item(item: &Item) -> Self {
        let date = item.published.with_timezone(&Utc).format("%Y-%m-%d");
        let stem = format!("{} [{date}]", sanitize_filename(&item.title));
        let extension = item.enclosure_type.as_deref().and_then(extension_for_mime);
        Self { stem, extension }
    }

    /// Filename without extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Extension resolved from feed metadata, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&'static str> {
        self.extension
    }

    /// Final filename when the extension is already known.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.extension.map(|ext| format!("{}{ext}", self.stem))
    }

    /// Final filename using the extension derived from a response
    /// `Content-Type`, falling back to [`FALLBACK_EXTENSION`].
    #[must_use]
    pub fn file_name_for_content_type(&self, content_type: Option<&str>) -> String {
        let ext = self
            .extension
            .or_else(|| content_type.and_then(extension_for_mime))
            .unwrap_or(FALLBACK_EXTENSION);
        format!("{}{ext}", self.stem)
    }

    /// Whether an existing directory entry named `name` is this episode
    /// under some extension.
    #[must_use]
    pub fn matches_existing(&self, name: &str) -> bool {
        if is_temp_file(name) {
            return false;
        }
        name.strip_prefix(self.stem.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|ext| !ext.is_empty() && !ext.contains('.'))
    }
}

/// Builds a unique hidden temp-file name next to `final_name`.
#[must_use]
pub fn temp_file_name(final_name: &str) -> String {
    let nonce: u32 = rand::thread_rng().r#gen();
    format!(".{final_name}.{nonce:08x}{TEMP_FILE_SUFFIX}")
}

/// Whether a directory entry is an in-flight (or orphaned) temp file.
#[must_use]
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_FILE_SUFFIX)
}
