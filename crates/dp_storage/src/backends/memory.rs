use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dp_core::{ContentKind, ContentStore, Error, Result, StoredRecord};
use tokio::sync::RwLock;

use crate::StorageBackend;

/// Records plus a `(collection, source_url) -> id` index.
#[derive(Default)]
pub struct MemoryStore {
    records: HashMap<(ContentKind, String), StoredRecord>,
    sources: HashMap<(ContentKind, String), String>,
}

impl MemoryStore {
    pub fn get_by_id(&self, kind: ContentKind, id: &str) -> Option<StoredRecord> {
        self.records.get(&(kind, id.to_string())).cloned()
    }

    pub fn find_by_source_url(&self, kind: ContentKind, source_url: &str) -> Option<StoredRecord> {
        self.sources
            .get(&(kind, source_url.to_string()))
            .and_then(|id| self.get_by_id(kind, id))
    }

    pub fn save(&mut self, record: &StoredRecord) -> Result<StoredRecord> {
        let kind = record.collection;
        let source_key = (kind, record.source_url.clone());

        if let Some(id) = self.sources.get(&source_key) {
            let existing = self
                .records
                .get_mut(&(kind, id.clone()))
                .ok_or_else(|| Error::Storage(format!("Source index points at missing record {}", id)))?;
            existing.summary = record.summary.clone();
            existing.body = record.body.clone();
            existing.tags = record.tags.clone();
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        let id_key = (kind, record.id.clone());
        if self.records.contains_key(&id_key) {
            return Err(Error::IdConflict(record.id.clone()));
        }

        self.records.insert(id_key, record.clone());
        self.sources.insert(source_key, record.id.clone());
        Ok(record.clone())
    }

    pub fn insert(&mut self, record: &StoredRecord) -> Result<Option<StoredRecord>> {
        if self.sources.contains_key(&(record.collection, record.source_url.clone())) {
            return Ok(None);
        }
        self.save(record).map(Some)
    }

    pub fn latest(&self, kind: ContentKind, limit: usize) -> Vec<StoredRecord> {
        let mut records = self
            .records
            .values()
            .filter(|r| r.collection == kind)
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by(|a, b| b.published_date.cmp(&a.published_date).then_with(|| a.id.cmp(&b.id)));
        records.truncate(limit);
        records
    }
}

/// Process-local backend used for tests and dry runs.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, kind: ContentKind) -> usize {
        let store = self.store.read().await;
        store.records.keys().filter(|(k, _)| *k == kind).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.records.is_empty()
    }
}

impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }
}

#[async_trait]
impl ContentStore for InMemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<StoredRecord>> {
        let store = self.store.read().await;
        Ok(store.get_by_id(kind, id))
    }

    async fn find_by_source_url(&self, kind: ContentKind, source_url: &str) -> Result<Option<StoredRecord>> {
        let store = self.store.read().await;
        Ok(store.find_by_source_url(kind, source_url))
    }

    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
        let mut store = self.store.write().await;
        store.save(record)
    }

    async fn insert(&self, record: &StoredRecord) -> Result<Option<StoredRecord>> {
        let mut store = self.store.write().await;
        store.insert(record)
    }

    async fn latest(&self, kind: ContentKind, limit: usize) -> Result<Vec<StoredRecord>> {
        let store = self.store.read().await;
        Ok(store.latest(kind, limit))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
