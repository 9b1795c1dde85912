use async_trait::async_trait;
use crate::types::{ContentKind, StoredRecord};
use crate::Result;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Fetch a record by its slug.
    async fn get_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<StoredRecord>>;

    /// Answer "has this source already been published?".
    async fn find_by_source_url(&self, kind: ContentKind, source_url: &str) -> Result<Option<StoredRecord>>;

    /// Atomic upsert keyed by `(collection, source_url)`.
    ///
    /// When a record for the source exists its summary, body, tags and
    /// `updated_at` are overwritten while `id`, `title` and `published_date`
    /// are kept. Otherwise the record is inserted under `record.id`; if that
    /// id already belongs to a different source the call fails with
    /// [`crate::Error::IdConflict`]. Returns the record as stored.
    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord>;

    /// Insert `record` only if its source is not stored yet.
    ///
    /// Returns `None` without writing anything when the source already has a
    /// record. Fails with [`crate::Error::IdConflict`] when `record.id`
    /// belongs to a different source. The check and the insert are atomic, so
    /// of two concurrent inserts for one source exactly one gets `Some`.
    async fn insert(&self, record: &StoredRecord) -> Result<Option<StoredRecord>>;

    /// Newest records first.
    async fn latest(&self, kind: ContentKind, limit: usize) -> Result<Vec<StoredRecord>>;

    /// Cheap reachability probe run before a pipeline starts.
    async fn health_check(&self) -> Result<()>;
}
