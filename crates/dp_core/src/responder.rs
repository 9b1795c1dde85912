use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::Result;

/// Limits and hints passed along with every prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    /// Upper bound on the response length, in characters.
    pub max_length: usize,
    /// Free-form style/role hint, e.g. `"summarizer"`.
    pub role: String,
}

impl Constraints {
    pub fn new(role: impl Into<String>, max_length: usize) -> Self {
        Self {
            max_length,
            role: role.into(),
        }
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &str;

    /// Complete `prompt`, returning raw model text.
    async fn complete(&self, prompt: &str, constraints: &Constraints) -> Result<String>;
}
