//! Feed fetching, item extraction and windowing.
//!
//! A feed document is parsed as RSS 2.0 first and as Atom if that fails.
//! Only entries that carry an enclosure become [`Item`]s; an entry with an
//! enclosure but a missing required field is reported as an [`ItemError`]
//! and dropped on its own without failing the rest of the feed.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::download::{FetchError, HttpClient, RateLimiter, RetryPolicy, with_retry};
use crate::model::{Item, Source};

/// Errors that abort discovery for a whole source.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed document could not be retrieved.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The body is neither RSS 2.0 nor Atom.
    #[error("failed to parse feed {url}: {message}")]
    Parse {
        /// Feed URL.
        url: String,
        /// Parser diagnostics.
        message: String,
    },
}

/// A feed entry that has an enclosure but cannot become an [`Item`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    /// A required element is absent or empty.
    #[error("entry {index}: missing {field}")]
    MissingField {
        /// Position of the entry in the document.
        index: usize,
        /// Name of the missing element.
        field: &'static str,
    },

    /// The publication date is not RFC 2822 or RFC 3339.
    #[error("entry {index}: unparseable date {value:?}")]
    InvalidDate {
        /// Position of the entry in the document.
        index: usize,
        /// The raw date text.
        value: String,
    },
}

/// Which slice of a feed's episodes to schedule.
///
/// Applied in fixed order: age filter, reverse, skip, limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowOptions {
    /// Oldest first instead of document order.
    pub reverse: bool,
    /// Drop this many items from the front.
    pub skip: Option<usize>,
    /// Keep at most this many items.
    pub limit: Option<usize>,
    /// Ignore items published more than this many days ago.
    pub max_age_days: Option<u32>,
}

/// Result of discovering one source.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Windowed items ready for scheduling.
    pub items: Vec<Item>,
    /// Entries dropped because of an [`ItemError`].
    pub dropped: usize,
    /// Fetch attempts made.
    pub attempts: u32,
}

/// Parses a feed document into per-entry results.
///
/// Entries without an enclosure are excluded entirely.
///
/// # Errors
///
/// Returns [`FeedError::Parse`] when the body parses as neither RSS nor Atom.
pub fn parse_feed(
    body: &[u8],
    source: &Arc<Source>,
) -> Result<Vec<Result<Item, ItemError>>, FeedError> {
    let rss_error = match rss::Channel::read_from(body) {
        Ok(channel) => return Ok(rss_items(&channel, source)),
        Err(e) => e,
    };

    match atom_syndication::Feed::read_from(body) {
        Ok(feed) => Ok(atom_items(&feed, source)),
        Err(atom_error) => Err(FeedError::Parse {
            url: source.xml_url.clone(),
            message: format!("not RSS ({rss_error}) and not Atom ({atom_error})"),
        }),
    }
}

fn rss_items(channel: &rss::Channel, source: &Arc<Source>) -> Vec<Result<Item, ItemError>> {
    channel
        .items()
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let enclosure = entry.enclosure()?;
            Some(build_item(
                source,
                index,
                RawEntry {
                    guid: entry.guid().map(rss::Guid::value),
                    title: entry.title(),
                    link: entry.link(),
                    published: entry.pub_date().map(DateText::Raw),
                    enclosure_url: Some(enclosure.url()),
                    enclosure_type: Some(enclosure.mime_type()),
                },
            ))
        })
        .collect()
}

fn atom_items(
    feed: &atom_syndication::Feed,
    source: &Arc<Source>,
) -> Vec<Result<Item, ItemError>> {
    feed.entries()
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let enclosure = entry.links().iter().find(|l| l.rel() == "enclosure")?;
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .map(atom_syndication::Link::href);
            let published = entry.published().unwrap_or_else(|| entry.updated());
            Some(build_item(
                source,
                index,
                RawEntry {
                    guid: Some(entry.id()),
                    title: Some(entry.title().value.as_str()),
                    link,
                    published: Some(DateText::Parsed(*published)),
                    enclosure_url: Some(enclosure.href()),
                    enclosure_type: enclosure.mime_type(),
                },
            ))
        })
        .collect()
}

enum DateText<'a> {
    Raw(&'a str),
    Parsed(DateTime<FixedOffset>),
}

struct RawEntry<'a> {
    guid: Option<&'a str>,
    title: Option<&'a str>,
    link: Option<&'a str>,
    published: Option<DateText<'a>>,
    enclosure_url: Option<&'a str>,
    enclosure_type: Option<&'a str>,
}

fn required<'a>(
    value: Option<&'a str>,
    index: usize,
    field: &'static str,
) -> Result<&'a str, ItemError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ItemError::MissingField { index, field })
}

fn build_item(source: &Arc<Source>, index: usize, raw: RawEntry<'_>) -> Result<Item, ItemError> {
    let guid = required(raw.guid, index, "guid")?;
    let title = required(raw.title, index, "title")?;
    let link = required(raw.link, index, "link")?;
    let enclosure_url = required(raw.enclosure_url, index, "enclosure url")?;
    let published = match raw.published {
        Some(DateText::Parsed(date)) => date,
        Some(DateText::Raw(text)) => {
            let text = required(Some(text), index, "publish date")?;
            parse_date(text).ok_or_else(|| ItemError::InvalidDate {
                index,
                value: text.to_string(),
            })?
        }
        None => {
            return Err(ItemError::MissingField {
                index,
                field: "publish date",
            });
        }
    };

    Ok(Item {
        source: Arc::clone(source),
        guid: guid.to_string(),
        title: title.to_string(),
        link: link.to_string(),
        published,
        enclosure_url: enclosure_url.to_string(),
        enclosure_type: raw
            .enclosure_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    })
}

fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
}

/// Applies the age filter and the reverse / skip / limit window.
#[must_use]
pub fn apply_window(items: Vec<Item>, window: &WindowOptions, now: DateTime<Utc>) -> Vec<Item> {
    // A window reaching past chrono's representable range has no cutoff.
    let cutoff = window.max_age_days.and_then(|days| {
        ChronoDuration::try_days(i64::from(days)).and_then(|age| now.checked_sub_signed(age))
    });
    let mut items: Vec<Item> = match cutoff {
        Some(cutoff) => items
            .into_iter()
            .filter(|item| item.published.with_timezone(&Utc) >= cutoff)
            .collect(),
        None => items,
    };

    if window.reverse {
        items.reverse();
    }

    items
        .into_iter()
        .skip(window.skip.unwrap_or(0))
        .take(window.limit.unwrap_or(usize::MAX))
        .collect()
}

/// Fetches `source`, parses it and returns the windowed items.
///
/// Transient fetch failures are retried per `policy`; parse failures are not.
///
/// # Errors
///
/// Returns [`FeedError`] when the source yields no usable document.
#[instrument(skip_all, fields(source = %source, url = %source.xml_url))]
pub async fn discover(
    client: &HttpClient,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    window: &WindowOptions,
    source: &Arc<Source>,
) -> Result<Discovery, FeedError> {
    let url = source.xml_url.as_str();
    let (body, attempts) = with_retry(policy, limiter, url, || client.fetch_bytes(url))
        .await
        .map_err(|(e, _)| e)?;

    let mut items = Vec::new();
    let mut dropped = 0usize;
    for entry in parse_feed(&body, source)? {
        match entry {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(error = %e, "dropping feed entry");
                dropped += 1;
            }
        }
    }

    let found = items.len();
    let items = apply_window(items, window, Utc::now());
    debug!(found, scheduled = items.len(), dropped, "feed parsed");

    Ok(Discovery {
        items,
        dropped,
        attempts,
    })
}
