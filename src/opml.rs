//! Source enumeration from an OPML subscription list.
//!
//! Outlines are walked depth-first so sources nested under category outlines
//! are found too. An outline is a source when its `type` is `rss` or `atom`
//! and it carries an `xmlUrl`.

use std::collections::HashSet;
use std::path::PathBuf;

use ::opml::{OPML, Outline};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::{FetchError, HttpClient};
use crate::model::Source;

/// Hex digits of the feed URL hash appended to a colliding folder name.
const FOLDER_HASH_CHARS: usize = 8;

/// Errors loading the subscription list. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// The local file could not be read.
    #[error("failed to read OPML file {path}: {source}")]
    Read {
        /// Path given on the command line.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The remote document could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The document is not valid OPML.
    #[error("failed to parse OPML {location}: {message}")]
    Parse {
        /// Path or URL of the document.
        location: String,
        /// Parser diagnostics.
        message: String,
    },
}

/// Loads sources from a local path or an http(s) URL, with folder names
/// already disambiguated.
///
/// # Errors
///
/// Returns [`OpmlError`] when the document cannot be read or parsed.
#[instrument(skip(client))]
pub async fn load_sources(location: &str, client: &HttpClient) -> Result<Vec<Source>, OpmlError> {
    let document = if is_remote(location) {
        debug!("fetching remote OPML");
        let body = client.fetch_bytes(location).await?;
        String::from_utf8_lossy(&body).into_owned()
    } else {
        tokio::fs::read_to_string(location)
            .await
            .map_err(|source| OpmlError::Read {
                path: PathBuf::from(location),
                source,
            })?
    };

    let sources = assign_folders(parse_sources(&document, location)?);
    info!(sources = sources.len(), "loaded subscriptions");
    Ok(sources)
}

fn is_remote(location: &str) -> bool {
    Url::parse(location).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Parses an OPML document into sources in depth-first document order.
///
/// # Errors
///
/// Returns [`OpmlError::Parse`] for malformed documents.
pub fn parse_sources(document: &str, location: &str) -> Result<Vec<Source>, OpmlError> {
    let opml = OPML::from_str(document).map_err(|e| OpmlError::Parse {
        location: location.to_string(),
        message: e.to_string(),
    })?;

    let mut sources = Vec::new();
    collect(&opml.body.outlines, &mut sources);
    Ok(sources)
}

fn collect(outlines: &[Outline], sources: &mut Vec<Source>) {
    for outline in outlines {
        if let Some(source) = to_source(outline) {
            sources.push(source);
        }
        collect(&outline.outlines, sources);
    }
}

fn to_source(outline: &Outline) -> Option<Source> {
    let kind = outline.r#type.as_deref()?.trim().to_ascii_lowercase();
    if kind != "rss" && kind != "atom" {
        return None;
    }
    let Some(xml_url) = outline.xml_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        warn!(outline = %outline.text, "feed outline without xmlUrl, ignoring");
        return None;
    };

    let title = outline
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&outline.text);

    Some(Source::new(
        kind,
        outline.text.clone(),
        title,
        outline.html_url.clone(),
        xml_url.trim(),
    ))
}

/// Gives every distinct source its own folder.
///
/// The first source keeps its sanitized title; a later source whose folder is
/// already taken gets the first hex digits of `sha256(xml_url)` appended.
#[must_use]
pub fn assign_folders(sources: Vec<Source>) -> Vec<Source> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut seen: HashSet<Source> = HashSet::new();

    sources
        .into_iter()
        .map(|source| {
            if !seen.insert(source.clone()) || taken.insert(source.folder().to_string()) {
                return source;
            }
            let folder = format!("{} [{}]", source.folder(), url_hash(&source.xml_url));
            warn!(source = %source, folder = %folder, "folder name collision, disambiguating");
            taken.insert(folder.clone());
            source.with_folder(folder)
        })
        .collect()
}

fn url_hash(xml_url: &str) -> String {
    let digest = Sha256::digest(xml_url.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..FOLDER_HASH_CHARS].to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NESTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline type="rss" text="Alpha" title="Alpha Show" xmlUrl="https://a.example/feed" htmlUrl="https://a.example"/>
    <outline text="News">
      <outline type="RSS" text="Beta" xmlUrl="https://b.example/feed"/>
      <outline type="link" text="Just a link" url="https://c.example"/>
    </outline>
    <outline type="atom" text="Gamma" title="Gamma" xmlUrl="https://g.example/atom"/>
    <outline type="rss" text="No url"/>
  </body>
</opml>"#;

    #[test]
    fn test_depth_first_walk_keeps_document_order() {
        let sources = parse_sources(NESTED, "subs.opml").unwrap();
        let titles: Vec<_> = sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Alpha Show", "Beta", "Gamma"]);
    }

    #[test]
    fn test_outline_fields_are_mapped() {
        let sources = parse_sources(NESTED, "subs.opml").unwrap();
        let alpha = &sources[0];
        assert_eq!(alpha.kind, "rss");
        assert_eq!(alpha.text, "Alpha");
        assert_eq!(alpha.html_url.as_deref(), Some("https://a.example"));
        assert_eq!(alpha.xml_url, "https://a.example/feed");

        // Title falls back to text and type matching ignores case.
        assert_eq!(sources[1].title, "Beta");
        assert_eq!(sources[1].kind, "rss");
        assert_eq!(sources[2].kind, "atom");
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        assert!(matches!(
            parse_sources("<opml><body>", "broken.opml"),
            Err(OpmlError::Parse { .. })
        ));
    }

    #[test]
    fn test_folder_collision_gets_url_hash_suffix() {
        let first = Source::new("rss", "Daily", "Daily", None, "https://one.example/feed");
        let second = Source::new("rss", "Daily", "Daily", None, "https://two.example/feed");
        let other = Source::new("rss", "Weekly", "Weekly", None, "https://three.example/feed");

        let assigned = assign_folders(vec![first, second, other]);

        assert_eq!(assigned[0].folder(), "Daily");
        let expected = format!("Daily [{}]", url_hash("https://two.example/feed"));
        assert_eq!(assigned[1].folder(), expected);
        assert_eq!(assigned[2].folder(), "Weekly");
        assert_eq!(url_hash("https://two.example/feed").len(), FOLDER_HASH_CHARS);
    }

    #[test]
    fn test_identical_sources_share_folder() {
        let a = Source::new("rss", "Daily", "Daily", None, "https://one.example/feed");
        let assigned = assign_folders(vec![a.clone(), a]);
        assert_eq!(assigned[0].folder(), assigned[1].folder());
    }

    #[tokio::test]
    async fn test_load_sources_from_local_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("subs.opml");
        std::fs::write(&path, NESTED).unwrap();

        let sources = load_sources(path.to_str().unwrap(), &HttpClient::new())
            .await
            .unwrap();
        assert_eq!(sources.len(), 3);
    }

    #[tokio::test]
    async fn test_load_sources_missing_file() {
        let result = load_sources("/definitely/not/here.opml", &HttpClient::new()).await;
        assert!(matches!(result, Err(OpmlError::Read { .. })));
    }
}
