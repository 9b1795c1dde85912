use dp_core::{Error, Result};
use serde::Deserialize;

use crate::json::response_object;

pub mod editor;
pub mod prompts;
pub mod summarizer;

pub use editor::EditorAgent;
pub use summarizer::SummarizerAgent;

/// Fields any agent response may carry. `null` and missing are the same.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AgentPayload {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub takeaways: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub disclaimer: Option<String>,
}

impl AgentPayload {
    /// Parse and shape-check a raw response: it must hold a JSON object with
    /// a non-empty title and body.
    pub(crate) fn from_response(agent: &str, text: &str) -> Result<Self> {
        let object = response_object(text).ok_or_else(|| {
            Error::MalformedAgentOutput(format!("{} response did not contain a JSON object", agent))
        })?;
        let payload: AgentPayload = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| Error::MalformedAgentOutput(format!("{} response has the wrong shape: {}", agent, e)))?;

        if payload.title().is_empty() {
            return Err(Error::MalformedAgentOutput(format!("{} returned an empty title", agent)));
        }
        if payload.body().is_empty() {
            return Err(Error::MalformedAgentOutput(format!("{} returned an empty body", agent)));
        }
        Ok(payload)
    }

    pub(crate) fn title(&self) -> &str {
        self.title.as_deref().map(str::trim).unwrap_or_default()
    }

    pub(crate) fn body(&self) -> &str {
        self.body.as_deref().map(str::trim).unwrap_or_default()
    }

    pub(crate) fn summary(&self) -> Option<&str> {
        self.summary.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

pub(crate) fn clean_list(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
        .map(str::to_string)
        .collect()
}
