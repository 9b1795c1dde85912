use chrono::{DateTime, Utc};
use dp_core::text::normalize_url;
use dp_core::{AggregatedItem, Error, FeedSource, Result};
use feed_rs::model::Entry;
use feed_rs::parser;
use tracing::debug;

pub(crate) const UNTITLED: &str = "Untitled update";

/// Parse an RSS/Atom document and normalize its first `limit` entries.
///
/// Entries without a usable http(s) link are dropped one by one; a document
/// that does not parse at all fails the whole source.
pub fn parse_feed(
    source: &FeedSource,
    body: &str,
    limit: usize,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<AggregatedItem>> {
    let feed = parser::parse(body.as_bytes()).map_err(|e| Error::Fetch {
        feed: source.name.clone(),
        message: format!("could not be parsed: {}", e),
    })?;

    Ok(feed
        .entries
        .into_iter()
        .take(limit)
        .filter_map(|entry| normalize_entry(source, entry, fetched_at))
        .collect())
}

fn canonical_link(entry: &Entry) -> Option<&str> {
    entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.as_str())
}

fn normalize_entry(source: &FeedSource, entry: Entry, fetched_at: DateTime<Utc>) -> Option<AggregatedItem> {
    let Some(source_url) = canonical_link(&entry).and_then(normalize_url) else {
        debug!(feed = %source.name, entry = %entry.id, "Skipping entry without a usable link");
        return None;
    };

    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let raw_summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            entry
                .content
                .as_ref()
                .and_then(|c| c.body.as_deref())
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
        })
        .unwrap_or_default();

    let guid = Some(entry.id.trim().to_lowercase()).filter(|g| !g.is_empty());

    Some(AggregatedItem {
        source_url,
        title,
        raw_summary,
        published_at: entry.published.or(entry.updated).unwrap_or(fetched_at),
        topic: source.topic.clone(),
        feed_name: source.name.clone(),
        guid,
    })
}
