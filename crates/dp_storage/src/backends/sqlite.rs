use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dp_core::{ContentKind, ContentStore, Error, Result, StoredRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow};
use sqlx::Row;

use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        source_url TEXT NOT NULL,
        title TEXT NOT NULL,
        summary TEXT NOT NULL,
        body TEXT NOT NULL,
        tags TEXT NOT NULL,
        published_date TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (collection, id),
        UNIQUE (collection, source_url)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_records_published
        ON records (collection, published_date DESC)
    "#,
];

const SELECT_COLUMNS: &str =
    "collection, id, source_url, title, summary, body, tags, published_date, updated_at";

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be writable at the configured path"
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    async fn fetch_one_where(&self, kind: ContentKind, column: &str, value: &str) -> Result<Option<StoredRecord>> {
        let sql = format!(
            "SELECT {} FROM records WHERE collection = ? AND {} = ?",
            SELECT_COLUMNS, column
        );
        let row = sqlx::query(&sql)
            .bind(kind.collection())
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Failed to look up record by {}: {}", column, e)))?;

        row.map(|r| row_to_record(&r)).transpose()
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Failed to parse date {}: {}", raw, e)))
}

fn row_to_record(row: &SqliteRow) -> Result<StoredRecord> {
    let collection: String = row.get("collection");
    let collection = ContentKind::from_collection(&collection)
        .ok_or_else(|| Error::Storage(format!("Unknown collection: {}", collection)))?;
    let tags: String = row.get("tags");
    let tags: BTreeSet<String> = serde_json::from_str(&tags)?;

    Ok(StoredRecord {
        id: row.get("id"),
        collection,
        source_url: row.get("source_url"),
        title: row.get("title"),
        summary: row.get("summary"),
        body: row.get("body"),
        tags,
        published_date: parse_date(&row.get::<String, _>("published_date"))?,
        updated_at: parse_date(&row.get::<String, _>("updated_at"))?,
    })
}

#[async_trait]
impl ContentStore for SQLiteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<StoredRecord>> {
        self.fetch_one_where(kind, "id", id).await
    }

    async fn find_by_source_url(&self, kind: ContentKind, source_url: &str) -> Result<Option<StoredRecord>> {
        self.fetch_one_where(kind, "source_url", source_url).await
    }

    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
        let tags = serde_json::to_string(&record.tags)?;
        let now = Utc::now().to_rfc3339();

        // The source conflict is resolved by the upsert; any other unique
        // violation can only come from the primary key.
        let result = sqlx::query(
            r#"
            INSERT INTO records
            (collection, id, source_url, title, summary, body, tags, published_date, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (collection, source_url) DO UPDATE SET
                summary = excluded.summary,
                body = excluded.body,
                tags = excluded.tags,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.collection.collection())
        .bind(&record.id)
        .bind(&record.source_url)
        .bind(&record.title)
        .bind(&record.summary)
        .bind(&record.body)
        .bind(tags)
        .bind(record.published_date.to_rfc3339())
        .bind(now)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(Error::IdConflict(record.id.clone()));
            }
            Err(e) => return Err(Error::Storage(format!("Failed to save record: {}", e))),
        }

        self.find_by_source_url(record.collection, &record.source_url)
            .await?
            .ok_or_else(|| Error::Storage(format!("Record for {} vanished after save", record.source_url)))
    }

    async fn insert(&self, record: &StoredRecord) -> Result<Option<StoredRecord>> {
        let tags = serde_json::to_string(&record.tags)?;

        // Only the source conflict is absorbed; a taken id still fails.
        let result = sqlx::query(
            r#"
            INSERT INTO records
            (collection, id, source_url, title, summary, body, tags, published_date, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (collection, source_url) DO NOTHING
            "#,
        )
        .bind(record.collection.collection())
        .bind(&record.id)
        .bind(&record.source_url)
        .bind(&record.title)
        .bind(&record.summary)
        .bind(&record.body)
        .bind(tags)
        .bind(record.published_date.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await;

        let inserted = match result {
            Ok(done) => done.rows_affected() > 0,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(Error::IdConflict(record.id.clone()));
            }
            Err(e) => return Err(Error::Storage(format!("Failed to insert record: {}", e))),
        };
        if !inserted {
            return Ok(None);
        }

        self.find_by_source_url(record.collection, &record.source_url).await
    }

    async fn latest(&self, kind: ContentKind, limit: usize) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT {} FROM records WHERE collection = ? ORDER BY published_date DESC, id ASC LIMIT ?",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(kind.collection())
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Failed to list records: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Database is not answering: {}", e)))?;
        Ok(())
    }
}
