use std::sync::Arc;

use dp_core::text::normalize_tags;
use dp_core::{Constraints, ContentKind, Draft, FinalizedArticle, Responder, Result};
use tracing::debug;

use super::prompts;
use super::{clean_list, AgentPayload};

const DEFAULT_MAX_LENGTH: usize = 4000;

/// Polishes a draft into a publishable article or tip.
pub struct EditorAgent {
    responder: Arc<dyn Responder>,
    kind: ContentKind,
    max_length: usize,
}

impl EditorAgent {
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
        Constraints::new(prompts::editor_role(self.kind), self.max_length)
    }

    pub fn build_prompt(&self, draft: &Draft) -> Result<String> {
        let input_json = serde_json::to_string_pretty(draft)?;
        Ok(prompts::render(prompts::editor_instructions(self.kind), &input_json))
    }

    pub async fn run(&self, draft: &Draft) -> Result<FinalizedArticle> {
        let prompt = self.build_prompt(draft)?;
        let constraints = self.constraints();
        debug!(source_url = %draft.source_url, role = %constraints.role, "Requesting edit from {}", self.responder.name());

        let response = self.responder.complete(&prompt, &constraints).await?;
        let payload = AgentPayload::from_response(&constraints.role, &response)?;

        let summary = payload.summary().unwrap_or(draft.summary.as_str()).to_string();
        let tags = normalize_tags(draft.tags.iter().chain(payload.tags.iter().flatten()));
        let (takeaways, disclaimer) = match self.kind {
            ContentKind::Article => {
                let takeaways = match payload.takeaways.as_deref() {
                    Some(edited) => clean_list(edited),
                    None => draft.takeaways.clone(),
                };
                let disclaimer = payload
                    .disclaimer
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string);
                (takeaways, disclaimer)
            }
            ContentKind::Tip => (Vec::new(), None),
        };

        Ok(FinalizedArticle {
            source_url: draft.source_url.clone(),
            title: payload.title().to_string(),
            summary,
            body: payload.body().to_string(),
            tags,
            takeaways,
            disclaimer,
            published_date: None,
        })
    }
}
