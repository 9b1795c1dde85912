use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dp_core::text::slugify;
use dp_core::{ContentKind, ContentStore, DuplicatePolicy, Error, FinalizedArticle, Result, StoredRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const MAX_SLUG_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishOutcome {
    Created,
    Updated,
    /// Nothing was written: the policy says skip, or the content is identical.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Publication {
    pub record: StoredRecord,
    pub outcome: PublishOutcome,
}

/// Writes finalized content to one collection of the store, keyed by source.
pub struct Publisher {
    store: Arc<dyn ContentStore>,
    kind: ContentKind,
    policy: DuplicatePolicy,
    storage_timeout: Duration,
}

impl Publisher {
    pub fn new(store: Arc<dyn ContentStore>, kind: ContentKind, policy: DuplicatePolicy, storage_timeout: Duration) -> Self {
        Self {
            store,
            kind,
            policy,
            storage_timeout,
        }
    }

    pub async fn is_duplicate(&self, article: &FinalizedArticle) -> Result<bool> {
        let existing = self
            .storage_op("source lookup", self.store.find_by_source_url(self.kind, &article.source_url))
            .await?;
        Ok(existing.is_some())
    }

    pub async fn publish(&self, article: &FinalizedArticle) -> Result<Publication> {
        let existing = self
            .storage_op("source lookup", self.store.find_by_source_url(self.kind, &article.source_url))
            .await?;

        match existing {
            Some(existing) => self.republish(existing, article).await,
            None => self.create(article).await,
        }
    }

    async fn republish(&self, existing: StoredRecord, article: &FinalizedArticle) -> Result<Publication> {
        if self.policy == DuplicatePolicy::Skip || existing.same_content(article) {
            debug!(source_url = %article.source_url, id = %existing.id, "Leaving stored {} untouched", self.kind);
            return Ok(Publication {
                record: existing,
                outcome: PublishOutcome::Unchanged,
            });
        }

        let record = StoredRecord::from_finalized(existing.id.clone(), self.kind, article, existing.published_date);
        let stored = self.storage_op("save", self.store.save(&record)).await?;
        info!("♻️ Updated {} '{}'", self.kind, stored.id);
        Ok(Publication {
            record: stored,
            outcome: PublishOutcome::Updated,
        })
    }

    async fn republish_stored(&self, article: &FinalizedArticle) -> Result<Publication> {
        let existing = self
            .storage_op("source lookup", self.store.find_by_source_url(self.kind, &article.source_url))
            .await?
            .ok_or_else(|| {
                Error::PublishFailed(format!("record for {} vanished during publish", article.source_url))
            })?;
        self.republish(existing, article).await
    }

    async fn create(&self, article: &FinalizedArticle) -> Result<Publication> {
        let base = match slugify(&article.title) {
            slug if slug.is_empty() => self.kind.singular().to_string(),
            slug => slug,
        };
        let published_date = article.published_date.unwrap_or_else(Utc::now);

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let candidate = match attempt {
                1 => base.clone(),
                n => format!("{}-{}", base, n),
            };

            let taken = self.storage_op("id lookup", self.store.get_by_id(self.kind, &candidate)).await?;
            match taken {
                // Published by a concurrent run between the lookup and now.
                Some(existing) if existing.source_url == article.source_url => {
                    return self.republish(existing, article).await;
                }
                Some(_) => continue,
                None => {}
            }

            let record = StoredRecord::from_finalized(candidate.clone(), self.kind, article, published_date);
            match self.storage_op("insert", self.store.insert(&record)).await {
                Ok(Some(stored)) => {
                    info!("📝 Published {} '{}'", self.kind, stored.id);
                    return Ok(Publication {
                        record: stored,
                        outcome: PublishOutcome::Created,
                    });
                }
                Ok(None) => {
                    debug!(source_url = %article.source_url, "Source claimed concurrently");
                    return self.republish_stored(article).await;
                }
                Err(Error::IdConflict(id)) => {
                    debug!(id = %id, "Slug taken concurrently, trying next suffix");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::PublishFailed(format!(
            "no free slug for '{}' after {} attempts",
            base, MAX_SLUG_ATTEMPTS
        )))
    }

    /// Bound a storage call by the storage timeout. Store errors other than
    /// slug conflicts become `PublishFailed`.
    async fn storage_op<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Err(_) => Err(Error::Timeout(format!("storage {} timed out after {:?}", op, self.storage_timeout))),
            Ok(Err(Error::IdConflict(id))) => Err(Error::IdConflict(id)),
            Ok(Err(e)) => Err(Error::PublishFailed(format!("storage {} failed: {}", op, e))),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use dp_storage::InMemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn article(source_url: &str, title: &str) -> FinalizedArticle {
        FinalizedArticle {
            source_url: source_url.to_string(),
            title: title.to_string(),
            summary: "Summary.".to_string(),
            body: "Body.".to_string(),
            tags: ["longevity".to_string()].into_iter().collect(),
            takeaways: vec![],
            disclaimer: None,
            published_date: None,
        }
    }

    fn publisher(store: &InMemoryStorage, policy: DuplicatePolicy) -> Publisher {
        Publisher::new(Arc::new(store.clone()), ContentKind::Article, policy, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_slug_collision_gets_suffix() {
        let store = InMemoryStorage::new();
        let publisher = publisher(&store, DuplicatePolicy::Update);

        let first = publisher.publish(&article("https://a.test/1", "My Title")).await.unwrap();
        let second = publisher.publish(&article("https://a.test/2", "My Title")).await.unwrap();
        let third = publisher.publish(&article("https://a.test/3", "My  Title!")).await.unwrap();

        assert_eq!(first.record.id, "my-title");
        assert_eq!(second.record.id, "my-title-2");
        assert_eq!(third.record.id, "my-title-3");
        assert_eq!(second.outcome, PublishOutcome::Created);
    }

    #[tokio::test]
    async fn test_empty_slug_falls_back_to_kind() {
        let store = InMemoryStorage::new();
        let publisher = publisher(&store, DuplicatePolicy::Update);
        let published = publisher.publish(&article("https://a.test/1", "!!!")).await.unwrap();
        assert_eq!(published.record.id, "article");
    }

    #[tokio::test]
    async fn test_republish_updates_content_keeps_identity() {
        let store = InMemoryStorage::new();
        let publisher = publisher(&store, DuplicatePolicy::Update);

        let mut original = article("https://a.test/1", "Fasting");
        original.published_date = Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        let first = publisher.publish(&original).await.unwrap();

        let mut revised = article("https://a.test/1", "Fasting, revisited");
        revised.summary = "New summary.".to_string();
        revised.tags.insert("diet".to_string());
        let second = publisher.publish(&revised).await.unwrap();

        assert_eq!(second.outcome, PublishOutcome::Updated);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.title, "Fasting");
        assert_eq!(second.record.summary, "New summary.");
        assert!(second.record.tags.contains("diet"));
        assert_eq!(second.record.published_date, first.record.published_date);
        assert_eq!(store.len(ContentKind::Article).await, 1);

        let third = publisher.publish(&revised).await.unwrap();
        assert_eq!(third.outcome, PublishOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_skip_policy_leaves_record() {
        let store = InMemoryStorage::new();
        let publisher = publisher(&store, DuplicatePolicy::Skip);

        publisher.publish(&article("https://a.test/1", "Walk")).await.unwrap();
        let mut revised = article("https://a.test/1", "Walk");
        revised.body = "Different.".to_string();
        let again = publisher.publish(&revised).await.unwrap();

        assert_eq!(again.outcome, PublishOutcome::Unchanged);
        assert_eq!(again.record.body, "Body.");
        assert!(publisher.is_duplicate(&revised).await.unwrap());
    }

    struct BrokenStore;

    #[async_trait]
    impl ContentStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get_by_id(&self, _kind: ContentKind, _id: &str) -> Result<Option<StoredRecord>> {
            Ok(None)
        }

        async fn find_by_source_url(&self, _kind: ContentKind, _url: &str) -> Result<Option<StoredRecord>> {
            Ok(None)
        }

        async fn save(&self, _record: &StoredRecord) -> Result<StoredRecord> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn insert(&self, _record: &StoredRecord) -> Result<Option<StoredRecord>> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn latest(&self, _kind: ContentKind, _limit: usize) -> Result<Vec<StoredRecord>> {
            Ok(vec![])
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_publish_failed() {
        let publisher = Publisher::new(
            Arc::new(BrokenStore),
            ContentKind::Article,
            DuplicatePolicy::Update,
            Duration::from_secs(5),
        );
        let err = publisher.publish(&article("https://a.test/1", "T")).await.unwrap_err();
        assert!(matches!(err, Error::PublishFailed(m) if m.contains("disk full")));
    }

    /// The next `misses` source lookups report nothing, as if another run
    /// published right after the lookup.
    struct StaleLookups {
        inner: InMemoryStorage,
        misses: AtomicUsize,
    }

    impl StaleLookups {
        fn new(inner: &InMemoryStorage, misses: usize) -> Self {
            Self {
                inner: inner.clone(),
                misses: AtomicUsize::new(misses),
            }
        }
    }

    #[async_trait]
    impl ContentStore for StaleLookups {
        fn name(&self) -> &str {
            "stale"
        }

        async fn get_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<StoredRecord>> {
            self.inner.get_by_id(kind, id).await
        }

        async fn find_by_source_url(&self, kind: ContentKind, url: &str) -> Result<Option<StoredRecord>> {
            let missed = self
                .misses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if missed {
                return Ok(None);
            }
            self.inner.find_by_source_url(kind, url).await
        }

        async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
            self.inner.save(record).await
        }

        async fn insert(&self, record: &StoredRecord) -> Result<Option<StoredRecord>> {
            self.inner.insert(record).await
        }

        async fn latest(&self, kind: ContentKind, limit: usize) -> Result<Vec<StoredRecord>> {
            self.inner.latest(kind, limit).await
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_source_published_concurrently_is_not_created_twice() {
        let store = InMemoryStorage::new();
        let publisher = Publisher::new(
            Arc::new(StaleLookups::new(&store, 3)),
            ContentKind::Article,
            DuplicatePolicy::Update,
            Duration::from_secs(5),
        );

        let first = publisher.publish(&article("https://a.test/1", "Fasting")).await.unwrap();
        assert_eq!(first.outcome, PublishOutcome::Created);

        // Same slug, same source: found through the id lookup.
        let same = publisher.publish(&article("https://a.test/1", "Fasting")).await.unwrap();
        assert_eq!(same.outcome, PublishOutcome::Unchanged);
        assert_eq!(same.record.id, "fasting");

        // New slug, same source: the insert finds the source taken.
        let mut renamed = article("https://a.test/1", "Fasting again");
        renamed.summary = "Changed.".to_string();
        let updated = publisher.publish(&renamed).await.unwrap();
        assert_eq!(updated.outcome, PublishOutcome::Updated);
        assert_eq!(updated.record.id, "fasting");
        assert_eq!(store.len(ContentKind::Article).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_source_honours_skip_policy() {
        let store = InMemoryStorage::new();
        let publisher = Publisher::new(
            Arc::new(StaleLookups::new(&store, 2)),
            ContentKind::Tip,
            DuplicatePolicy::Skip,
            Duration::from_secs(5),
        );

        publisher.publish(&article("https://a.test/1", "Walk")).await.unwrap();
        let mut renamed = article("https://a.test/1", "Walk more");
        renamed.body = "Different.".to_string();
        let again = publisher.publish(&renamed).await.unwrap();

        assert_eq!(again.outcome, PublishOutcome::Unchanged);
        assert_eq!(again.record.body, "Body.");
    }
}
