use std::sync::Arc;

use dp_core::text::{normalize_tags, truncate_chars};
use dp_core::{AggregatedItem, Constraints, ContentKind, Draft, Responder, Result};
use serde::Serialize;
use tracing::debug;

use super::prompts;
use super::{clean_list, AgentPayload};

const DEFAULT_MAX_LENGTH: usize = 4000;
const SUMMARY_FALLBACK_CHARS: usize = 160;

/// What the model sees of an aggregated item.
#[derive(Serialize)]
struct NoteInput<'a> {
    title: &'a str,
    summary: &'a str,
    source_url: &'a str,
    feed: &'a str,
    topic: Option<&'a str>,
    published: String,
}

/// Turns one aggregated item into a draft (an article draft or a tip draft,
/// depending on `kind`).
pub struct SummarizerAgent {
    responder: Arc<dyn Responder>,
    kind: ContentKind,
    max_length: usize,
}

impl SummarizerAgent {
    pub fn new(responder: Arc<dyn Responder>, kind: ContentKind) -> Self {
        Self {
            responder,
            kind,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn constraints(&self) -> Constraints {
        Constraints::new(prompts::summarizer_role(self.kind), self.max_length)
    }

    pub fn build_prompt(&self, item: &AggregatedItem) -> Result<String> {
        let input = NoteInput {
            title: &item.title,
            summary: &item.raw_summary,
            source_url: &item.source_url,
            feed: &item.feed_name,
            topic: item.topic.as_deref(),
            published: item.published_at.format("%Y-%m-%d").to_string(),
        };
        let input_json = serde_json::to_string_pretty(&input)?;
        Ok(prompts::render(prompts::summarizer_instructions(self.kind), &input_json))
    }

    pub async fn run(&self, item: &AggregatedItem) -> Result<Draft> {
        let prompt = self.build_prompt(item)?;
        let constraints = self.constraints();
        debug!(source_url = %item.source_url, role = %constraints.role, "Requesting draft from {}", self.responder.name());

        let response = self.responder.complete(&prompt, &constraints).await?;
        let payload = AgentPayload::from_response(&constraints.role, &response)?;

        let body = payload.body().to_string();
        let summary = payload
            .summary()
            .map(str::to_string)
            .unwrap_or_else(|| truncate_chars(&body, SUMMARY_FALLBACK_CHARS).trim().to_string());
        let takeaways = match self.kind {
            ContentKind::Article => clean_list(payload.takeaways.as_deref().unwrap_or_default()),
            ContentKind::Tip => Vec::new(),
        };

        Ok(Draft {
            source_url: item.source_url.clone(),
            title: payload.title().to_string(),
            summary,
            body,
            tags: normalize_tags(payload.tags.iter().flatten()),
            takeaways,
        })
    }
}
