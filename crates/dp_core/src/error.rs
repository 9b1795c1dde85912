use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch feed '{feed}': {message}")]
    Fetch { feed: String, message: String },

    #[error("Responder error: {0}")]
    Responder(String),

    #[error("Malformed agent output: {0}")]
    MalformedAgentOutput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Identifier already taken by another source: {0}")]
    IdConflict(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Fatal configuration error: {0}")]
    FatalConfiguration(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Errors that abort a run instead of being counted against a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::FatalConfiguration(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
