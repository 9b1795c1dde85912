use std::sync::Arc;

use dp_core::config::StorageConfig;
use dp_core::{ContentStore, Error, Result};
use tracing::info;

pub mod backends;

pub use backends::*;

/// Backends that can be named in configuration.
pub trait StorageBackend: ContentStore {
    fn get_error_message() -> &'static str
    where
        Self: Sized;
}

/// Build the backend named by `config` and make sure it answers.
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn ContentStore>> {
    let storage: Arc<dyn ContentStore> = match config {
        StorageConfig::Memory => Arc::new(InMemoryStorage::new()),
        #[cfg(feature = "sqlite")]
        StorageConfig::Sqlite { path } => {
            let storage = SQLiteStorage::new_with_path(path).await.map_err(|e| {
                Error::FatalConfiguration(format!("{}: {}", SQLiteStorage::get_error_message(), e))
            })?;
            Arc::new(storage)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageConfig::Sqlite { .. } => {
            return Err(Error::FatalConfiguration(
                "SQLite support was not compiled in (enable the `sqlite` feature)".to_string(),
            ))
        }
    };

    storage
        .health_check()
        .await
        .map_err(|e| Error::FatalConfiguration(format!("Storage backend {} is unreachable: {}", storage.name(), e)))?;
    info!("🏦 Storage backend initialized (using {})", storage.name());

    Ok(storage)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_storage() {
        let storage = create_storage(&StorageConfig::Memory).await.unwrap();
        assert_eq!(storage.name(), "memory");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_create_sqlite_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::Sqlite {
            path: temp_dir.path().join("nested").join("content.db"),
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.name(), "sqlite");
    }
}
