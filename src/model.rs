//! Feed sources, discovered episodes, and the task type carried by the queue.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::download::sanitize_filename;

/// A feed subscription read from the OPML document.
///
/// Identity is the full `(kind, text, title, html_url, xml_url)` tuple. The
/// destination `folder` is derived at enumeration time and is not part of it.
#[derive(Debug, Clone)]
pub struct Source {
    /// Outline `type` attribute (`rss`, `atom`).
    pub kind: String,
    /// Outline `text` attribute.
    pub text: String,
    /// Display title; falls back to `text` when the outline has none.
    pub title: String,
    /// Website of the show, if listed.
    pub html_url: Option<String>,
    /// Feed document URL.
    pub xml_url: String,
    folder: String,
}

impl Source {
    /// Creates a source whose folder is its sanitized title.
    pub fn new(
        kind: impl Into<String>,
        text: impl Into<String>,
        title: impl Into<String>,
        html_url: Option<String>,
        xml_url: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            kind: kind.into(),
            text: text.into(),
            folder: sanitize_filename(&title),
            title,
            html_url,
            xml_url: xml_url.into(),
        }
    }

    /// Subdirectory of the download root that holds this show's episodes.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Overrides the destination folder (used to disambiguate collisions).
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    fn identity(&self) -> (&str, &str, &str, Option<&str>, &str) {
        (
            &self.kind,
            &self.text,
            &self.title,
            self.html_url.as_deref(),
            &self.xml_url,
        )
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// One episode discovered in a feed.
///
/// Equality covers every field, so two episodes that would share a filename
/// but differ in guid or mime type are still distinct tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    /// Show this episode belongs to.
    pub source: Arc<Source>,
    /// Feed-declared unique id (`<guid>` / Atom `<id>`).
    pub guid: String,
    /// Episode title.
    pub title: String,
    /// Episode web page.
    pub link: String,
    /// Publication date as declared in the feed.
    pub published: DateTime<FixedOffset>,
    /// Payload URL.
    pub enclosure_url: String,
    /// Payload mime type; `None` when the feed leaves it empty.
    pub enclosure_type: Option<String>,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.source.title, self.title)
    }
}

/// A unit of work on the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Task {
    /// Fetch a feed and discover its episodes.
    Feed(Arc<Source>),
    /// Download one episode's enclosure.
    Episode(Arc<Item>),
}

impl Task {
    /// Short label for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Feed(_) => "feed",
            Self::Episode(_) => "episode",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feed(source) => write!(f, "feed {source}"),
            Self::Episode(item) => write!(f, "episode {item}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn source() -> Source {
        Source::new(
            "rss",
            "Show",
            "Show: Daily",
            Some("https://show.example".to_string()),
            "https://show.example/feed.xml",
        )
    }

    #[test]
    fn test_source_folder_is_sanitized_title() {
        assert_eq!(source().folder(), "Show Daily");
    }

    #[test]
    fn test_folder_override_does_not_change_identity() {
        let plain = source();
        let renamed = source().with_folder("Show Daily [abcd1234]");
        assert_eq!(plain, renamed);

        let mut set = HashSet::new();
        assert!(set.insert(plain));
        assert!(!set.insert(renamed));
    }

    #[test]
    fn test_source_identity_covers_every_field() {
        let other_url = Source::new(
            "rss",
            "Show",
            "Show: Daily",
            Some("https://show.example".to_string()),
            "https://mirror.example/feed.xml",
        );
        assert_ne!(source(), other_url);
    }

    #[test]
    fn test_items_differing_only_in_guid_are_distinct_tasks() {
        let source = Arc::new(source());
        let published = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap();
        let a = Item {
            source: Arc::clone(&source),
            guid: "a".to_string(),
            title: "Same".to_string(),
            link: "https://show.example/1".to_string(),
            published,
            enclosure_url: "https://cdn.example/1.mp3".to_string(),
            enclosure_type: Some("audio/mpeg".to_string()),
        };
        let b = Item {
            guid: "b".to_string(),
            ..a.clone()
        };

        let tasks: HashSet<Task> = [Task::Episode(Arc::new(a)), Task::Episode(Arc::new(b))]
            .into_iter()
            .collect();
        assert_eq!(tasks.len(), 2);
    }
}
