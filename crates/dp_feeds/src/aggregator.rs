use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dp_core::{AggregatedItem, Error, FeedSource, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::parse::{parse_feed, UNTITLED};
use crate::transport::FeedTransport;

/// A source that produced nothing this run. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub feed_name: String,
    pub url: String,
    pub message: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to fetch feed '{}': {}", self.feed_name, self.message)
    }
}

#[derive(Debug, Default)]
pub struct AggregationResult {
    pub items: Vec<AggregatedItem>,
    pub failures: Vec<FetchFailure>,
    /// Sources that answered with a parseable document.
    pub reachable: usize,
}

/// Dedup keys of the entries kept so far in one fetch.
#[derive(Default)]
struct SeenEntries {
    urls: HashSet<String>,
    /// GUIDs are only unique within the feed that issued them.
    guids: HashSet<(String, String)>,
    signatures: HashSet<(String, i64)>,
}

impl SeenEntries {
    /// Record `item`'s keys. Returns false if any of them was seen already.
    fn insert(&mut self, item: &AggregatedItem, fetched_at: DateTime<Utc>) -> bool {
        let guid = item.guid.as_ref().map(|g| (item.feed_name.clone(), g.clone()));
        let signature = Self::signature(item, fetched_at);

        if self.urls.contains(&item.source_url)
            || guid.as_ref().is_some_and(|g| self.guids.contains(g))
            || signature.as_ref().is_some_and(|s| self.signatures.contains(s))
        {
            return false;
        }

        self.urls.insert(item.source_url.clone());
        self.guids.extend(guid);
        self.signatures.extend(signature);
        true
    }

    /// Title and publish time, when the entry carries both for real.
    fn signature(item: &AggregatedItem, fetched_at: DateTime<Utc>) -> Option<(String, i64)> {
        let title = item.title.trim().to_lowercase();
        if title.is_empty() || title == UNTITLED.to_lowercase() || item.published_at == fetched_at {
            return None;
        }
        Some((title, item.published_at.timestamp()))
    }
}

pub struct FeedAggregator {
    transport: Arc<dyn FeedTransport>,
    fetch_timeout: Duration,
}

impl FeedAggregator {
    pub fn new(transport: Arc<dyn FeedTransport>, fetch_timeout: Duration) -> Self {
        Self {
            transport,
            fetch_timeout,
        }
    }

    /// Fetch every source once, in order, and merge the entries.
    ///
    /// An entry is dropped when an earlier one in this fetch has the same
    /// link, the same GUID within the same feed, or the same title and
    /// publish time. The first occurrence wins.
    pub async fn fetch(&self, sources: &[FeedSource], limit_per_feed: usize) -> AggregationResult {
        let mut result = AggregationResult::default();
        let mut seen = SeenEntries::default();
        let fetched_at = Utc::now();

        for source in sources {
            let entries = match self.fetch_source(source, limit_per_feed, fetched_at).await {
                Ok(entries) => entries,
                Err(e) => {
                    let failure = FetchFailure {
                        feed_name: source.name.clone(),
                        url: source.url.clone(),
                        message: match e {
                            Error::Fetch { message, .. } => message,
                            other => other.to_string(),
                        },
                    };
                    warn!("⚠️ {}", failure);
                    result.failures.push(failure);
                    continue;
                }
            };
            result.reachable += 1;

            let mut kept = 0;
            for item in entries {
                if !seen.insert(&item, fetched_at) {
                    debug!(source_url = %item.source_url, feed = %source.name, "Dropping repeated entry");
                    continue;
                }
                result.items.push(item);
                kept += 1;
            }
            info!("📰 {} entries from '{}'", kept, source.name);
        }

        result
    }

    async fn fetch_source(
        &self,
        source: &FeedSource,
        limit: usize,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<AggregatedItem>> {
        let body = tokio::time::timeout(self.fetch_timeout, self.transport.get(&source.url))
            .await
            .map_err(|_| Error::Fetch {
                feed: source.name.clone(),
                message: format!("timed out after {:?}", self.fetch_timeout),
            })?
            .map_err(|e| Error::Fetch {
                feed: source.name.clone(),
                message: e.to_string(),
            })?;

        parse_feed(source, &body, limit, fetched_at)
    }
}
