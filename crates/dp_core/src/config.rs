use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ContentKind, DuplicatePolicy, FeedSource};
use crate::{Error, Result};

pub const FEED_SOURCES_ENV: &str = "DAILYPRESS_FEED_SOURCES";
pub const DEFAULT_DB_PATH: &str = "data/content.db";
pub const DEFAULT_REMOTE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REMOTE_MODEL: &str = "gpt-4o-mini";

pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "Google News: Longevity Research",
            "https://news.google.com/rss/search?q=longevity+research&hl=en-US&gl=US&ceid=US:en",
            Some("research"),
        ),
        FeedSource::new(
            "Google News: Healthy Aging",
            "https://news.google.com/rss/search?q=%22healthy+aging%22&hl=en-US&gl=US&ceid=US:en",
            Some("aging"),
        ),
        FeedSource::new(
            "Google News: Longevity Nutrition",
            "https://news.google.com/rss/search?q=longevity+nutrition&hl=en-US&gl=US&ceid=US:en",
            Some("lifestyle"),
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub fetch_secs: u64,
    pub responder_secs: u64,
    pub storage_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch_secs: 10,
            responder_secs: 60,
            storage_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }

    pub fn responder(&self) -> Duration {
        Duration::from_secs(self.responder_secs)
    }

    pub fn storage(&self) -> Duration {
        Duration::from_secs(self.storage_secs)
    }
}

/// Everything one pipeline run needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub feeds: Vec<FeedSource>,
    pub limit_per_feed: usize,
    /// `None` processes every candidate.
    pub max_publishes: Option<usize>,
    pub timeouts: Timeouts,
    pub article_policy: DuplicatePolicy,
    pub tip_policy: DuplicatePolicy,
    /// Extra request headers for feed fetching.
    pub feed_headers: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            limit_per_feed: 5,
            max_publishes: Some(1),
            timeouts: Timeouts::default(),
            article_policy: DuplicatePolicy::Update,
            tip_policy: DuplicatePolicy::Skip,
            feed_headers: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn policy_for(&self, kind: ContentKind) -> DuplicatePolicy {
        match kind {
            ContentKind::Article => self.article_policy,
            ContentKind::Tip => self.tip_policy,
        }
    }

    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::FatalConfiguration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::FatalConfiguration(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Replace the feed list with the JSON array in `raw`.
    pub fn with_feeds_json(mut self, raw: &str) -> Result<Self> {
        self.feeds = serde_json::from_str::<Vec<FeedSource>>(raw).map_err(|e| {
            Error::FatalConfiguration(format!("{} must contain a JSON list of feeds: {}", FEED_SOURCES_ENV, e))
        })?;
        Ok(self)
    }

    /// Checks that must pass before a scheduled run is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            return Err(Error::FatalConfiguration("No feed sources configured".to_string()));
        }
        if let Some(feed) = self.feeds.iter().find(|f| f.url.trim().is_empty()) {
            return Err(Error::FatalConfiguration(format!("Feed '{}' has no URL", feed.name)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic offline responder.
    #[default]
    Local,
    /// OpenAI-compatible chat completions endpoint.
    Remote,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "dummy" => Ok(ProviderKind::Local),
            "remote" | "openai" | "gpt" => Ok(ProviderKind::Remote),
            other => Err(format!("Unknown model provider: {}", other)),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_length: usize,
}

impl std::fmt::Debug for ResponderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            base_url: DEFAULT_REMOTE_URL.to_string(),
            model: DEFAULT_REMOTE_MODEL.to_string(),
            api_key: None,
            temperature: 0.2,
            max_length: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl StorageConfig {
    pub fn from_name(name: &str, path: Option<PathBuf>) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageConfig::Memory),
            "sqlite" => Ok(StorageConfig::Sqlite {
                path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            }),
            other => Err(Error::FatalConfiguration(format!("Unknown storage backend: {}", other))),
        }
    }
}
