use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dp_core::config::ResponderConfig;
use dp_core::{Constraints, Error, Responder, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct RemoteResponder {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl RemoteResponder {
    pub fn new(config: &ResponderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::FatalConfiguration("Remote responder requires an API key".to_string()))?;
        if config.base_url.trim().is_empty() {
            return Err(Error::FatalConfiguration("Remote responder requires a base URL".to_string()));
        }

        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn system_message(constraints: &Constraints) -> String {
        format!(
            "You are the {} of a longevity publication. Respond only with JSON. Keep the response under {} characters.",
            constraints.role, constraints.max_length
        )
    }
}

impl fmt::Debug for RemoteResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResponder")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl Responder for RemoteResponder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, constraints: &Constraints) -> Result<String> {
        let system = Self::system_message(constraints);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: self.temperature,
            // Rough chars-per-token bound.
            max_tokens: (constraints.max_length / 3).max(256),
        };

        debug!(model = %self.model, role = %constraints.role, "Sending chat completion request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Responder(format!("{} request failed: {}", self.model, e)))?
            .json::<ChatResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::Responder(format!("{} returned no completion", self.model)))
    }
}
