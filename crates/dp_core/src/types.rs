use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured RSS/Atom feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub topic: Option<String>,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, topic: Option<&str>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            topic: topic.map(str::to_string),
        }
    }
}

/// One normalized feed entry. Only lives for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedItem {
    pub source_url: String,
    pub title: String,
    pub raw_summary: String,
    pub published_at: DateTime<Utc>,
    pub topic: Option<String>,
    pub feed_name: String,
    #[serde(default)]
    pub guid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub source_url: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub takeaways: Vec<String>,
}

/// Editor output, ready for the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedArticle {
    pub source_url: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default)]
    pub disclaimer: Option<String>,
    /// Set by the publisher on first publish when absent.
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
}

impl FinalizedArticle {
    /// Body as it is persisted: the edited body followed by the takeaways
    /// list and the disclaimer, when present.
    pub fn content_body(&self) -> String {
        let mut sections = vec![self.body.trim().to_string()];

        let bullets = self
            .takeaways
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| format!("- {}", t))
            .collect::<Vec<_>>();
        if !bullets.is_empty() {
            sections.push(format!("**Key Takeaways**\n{}", bullets.join("\n")));
        }

        if let Some(disclaimer) = self.disclaimer.as_deref().map(str::trim) {
            if !disclaimer.is_empty() {
                sections.push(format!("> {}", disclaimer));
            }
        }

        sections
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Article,
    Tip,
}

impl ContentKind {
    pub fn collection(&self) -> &'static str {
        match self {
            ContentKind::Article => "articles",
            ContentKind::Tip => "tips",
        }
    }

    /// Fallback slug for titles that reduce to nothing.
    pub fn singular(&self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Tip => "tip",
        }
    }

    pub fn from_collection(collection: &str) -> Option<Self> {
        match collection {
            "articles" => Some(ContentKind::Article),
            "tips" => Some(ContentKind::Tip),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "article" | "articles" => Ok(ContentKind::Article),
            "tip" | "tips" => Ok(ContentKind::Tip),
            other => Err(format!("Unknown content kind: {}", other)),
        }
    }
}

/// What to do when a finalized record arrives for a source that is
/// already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Latest refinement wins for summary, body and tags.
    #[default]
    Update,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub collection: ContentKind,
    pub source_url: String,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub tags: BTreeSet<String>,
    pub published_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn from_finalized(
        id: String,
        collection: ContentKind,
        article: &FinalizedArticle,
        published_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            collection,
            source_url: article.source_url.clone(),
            title: article.title.clone(),
            summary: article.summary.clone(),
            body: article.content_body(),
            tags: article.tags.clone(),
            published_date,
            updated_at: Utc::now(),
        }
    }

    /// True when the stored content already matches the finalized article.
    pub fn same_content(&self, article: &FinalizedArticle) -> bool {
        self.summary == article.summary
            && self.body == article.content_body()
            && self.tags == article.tags
    }
}
