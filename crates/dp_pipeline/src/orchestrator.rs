use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dp_core::config::PipelineConfig;
use dp_core::{AggregatedItem, ContentKind, ContentStore, Error, Responder, Result};
use dp_feeds::{FeedAggregator, FeedTransport};
use dp_inference::{EditorAgent, SummarizerAgent};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::publisher::{Publication, PublishOutcome, Publisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Fetching,
    Filtering,
    Processing,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Fetching => "fetching",
            RunPhase::Filtering => "filtering",
            RunPhase::Processing => "processing",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub source_url: String,
    pub message: String,
}

/// What a run did. Printed as JSON by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub kind: ContentKind,
    /// Entries obtained from reachable sources after in-run dedup.
    pub fetched: usize,
    pub skipped_duplicate: usize,
    pub published: usize,
    pub failed: usize,
    pub errors: Vec<ItemError>,
    pub warnings: Vec<String>,
    /// Ids written this run, in publish order.
    pub published_ids: Vec<String>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    fn new(kind: ContentKind) -> Self {
        let now = Utc::now();
        Self {
            kind,
            fetched: 0,
            skipped_duplicate: 0,
            published: 0,
            failed: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            published_ids: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    fn record_failure(&mut self, source_url: &str, err: &Error) {
        error!(source_url = %source_url, "❌ {}", err);
        self.failed += 1;
        self.errors.push(ItemError {
            source_url: source_url.to_string(),
            message: err.to_string(),
        });
    }
}

/// One content pipeline: aggregate, summarize, edit, publish.
pub struct Pipeline {
    kind: ContentKind,
    config: PipelineConfig,
    aggregator: FeedAggregator,
    summarizer: SummarizerAgent,
    editor: EditorAgent,
    publisher: Publisher,
    store: Arc<dyn ContentStore>,
}

impl Pipeline {
    pub fn new(
        kind: ContentKind,
        config: PipelineConfig,
        transport: Arc<dyn FeedTransport>,
        store: Arc<dyn ContentStore>,
        summarizer: Arc<dyn Responder>,
        editor: Arc<dyn Responder>,
    ) -> Self {
        let timeouts = &config.timeouts;
        let aggregator = FeedAggregator::new(transport, timeouts.fetch());
        let publisher = Publisher::new(store.clone(), kind, config.policy_for(kind), timeouts.storage());

        Self {
            kind,
            aggregator,
            summarizer: SummarizerAgent::new(summarizer, kind),
            editor: EditorAgent::new(editor, kind),
            publisher,
            store,
            config,
        }
    }

    /// Cap on characters requested from the responders.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.summarizer = self.summarizer.with_max_length(max_length);
        self.editor = self.editor.with_max_length(max_length);
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    fn enter(&self, phase: RunPhase) {
        info!(kind = %self.kind, "🔄 Pipeline phase: {}", phase);
    }

    /// Execute one run. Only fatal errors are returned; everything else is
    /// reported in the summary.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.kind);

        self.enter(RunPhase::Fetching);
        if self.config.feeds.is_empty() {
            info!("📭 No feed sources configured, nothing to do");
            return Ok(self.finish(summary));
        }

        let fetched = self.aggregator.fetch(&self.config.feeds, self.config.limit_per_feed).await;
        summary.warnings = fetched.failures.iter().map(|f| f.to_string()).collect();
        summary.fetched = fetched.items.len();
        if fetched.reachable == 0 {
            warn!("⚠️ No feed source could be reached");
            return Ok(self.finish(summary));
        }
        info!("📥 Fetched {} entries from {} sources", summary.fetched, fetched.reachable);

        self.enter(RunPhase::Filtering);
        let mut candidates = Vec::new();
        for item in fetched.items {
            match self.already_published(&item.source_url).await {
                Ok(true) => {
                    debug!(source_url = %item.source_url, "Already published, skipping");
                    summary.skipped_duplicate += 1;
                }
                Ok(false) => candidates.push(item),
                Err(e) => summary.record_failure(&item.source_url, &e),
            }
        }
        info!("🔍 {} new candidates, {} already published", candidates.len(), summary.skipped_duplicate);

        self.enter(RunPhase::Processing);
        for item in candidates {
            if cancel.is_cancelled() {
                warn!("🛑 Run cancelled, stopping before '{}'", item.source_url);
                summary.cancelled = true;
                break;
            }
            if let Some(quota) = self.config.max_publishes {
                if summary.published >= quota {
                    info!("🎯 Publish quota of {} reached", quota);
                    break;
                }
            }

            // Another run may have published this source since filtering.
            match self.already_published(&item.source_url).await {
                Ok(true) => {
                    summary.skipped_duplicate += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    summary.record_failure(&item.source_url, &e);
                    continue;
                }
            }

            match self.process_item(&item).await {
                Ok(publication) => match publication.outcome {
                    PublishOutcome::Created | PublishOutcome::Updated => {
                        summary.published += 1;
                        summary.published_ids.push(publication.record.id);
                    }
                    PublishOutcome::Unchanged => summary.skipped_duplicate += 1,
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => summary.record_failure(&item.source_url, &e),
            }
        }

        Ok(self.finish(summary))
    }

    fn finish(&self, mut summary: RunSummary) -> RunSummary {
        self.enter(RunPhase::Done);
        summary.finished_at = Utc::now();
        info!(
            "✅ {} run finished: {} fetched, {} published, {} skipped, {} failed",
            self.kind, summary.fetched, summary.published, summary.skipped_duplicate, summary.failed
        );
        summary
    }

    async fn already_published(&self, source_url: &str) -> Result<bool> {
        let timeout = self.config.timeouts.storage();
        let existing = tokio::time::timeout(timeout, self.store.find_by_source_url(self.kind, source_url))
            .await
            .map_err(|_| Error::Timeout(format!("source lookup timed out after {:?}", timeout)))??;
        Ok(existing.is_some())
    }

    async fn process_item(&self, item: &AggregatedItem) -> Result<Publication> {
        info!("📰 Processing: {}", item.title);
        let timeout = self.config.timeouts.responder();

        let draft = with_timeout("summarizer", timeout, self.summarizer.run(item)).await?;
        debug!(source_url = %item.source_url, "🤖 Draft ready: {}", draft.title);

        let article = with_timeout("editor", timeout, self.editor.run(&draft)).await?;
        debug!(source_url = %item.source_url, "✨ Edit ready: {}", article.title);

        self.publisher.publish(&article).await
    }
}

async fn with_timeout<T>(what: &str, limit: Duration, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(format!("{} timed out after {:?}", what, limit)))?
}
