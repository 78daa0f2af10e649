//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::record_store::Result;
use crate::interfaces::{RecordStore, RollupStore, StorageError};

pub mod mock;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub mod schema;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub mod sql;

#[cfg(feature = "sqlite")]
pub use sql::sqlite::{SqliteRecordStore, SqliteRollupStore};

#[cfg(feature = "postgres")]
pub use sql::postgres::{PostgresRecordStore, PostgresRollupStore};

/// Initialize storage based on configuration.
///
/// Connects, runs the bootstrap DDL, and returns the record and rollup
/// stores sharing one pool.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<(Arc<dyn RecordStore>, Arc<dyn RollupStore>)> {
    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!(path = %config.sqlite.path, "Storage: sqlite");

            if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            }

            // WAL plus a busy timeout keeps concurrent partition upserts
            // from surfacing spurious SQLITE_BUSY failures.
            let options = sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&config.sqlite.path)
                .create_if_missing(true)
                .foreign_keys(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5));
            let pool = sqlx::SqlitePool::connect_with(options).await?;

            sqlx::raw_sql(schema::SQLITE_SCHEMA).execute(&pool).await?;

            Ok((
                Arc::new(SqliteRecordStore::new(pool.clone())),
                Arc::new(SqliteRollupStore::new(pool)),
            ))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => Err(StorageError::UnsupportedBackend(
            "sqlite feature not enabled".to_string(),
        )),
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            info!("Storage: postgres");

            let pool = sqlx::PgPool::connect(&config.postgres.uri).await?;

            sqlx::raw_sql(schema::POSTGRES_SCHEMA).execute(&pool).await?;

            Ok((
                Arc::new(PostgresRecordStore::new(pool.clone())),
                Arc::new(PostgresRollupStore::new(pool)),
            ))
        }
        #[cfg(not(feature = "postgres"))]
        StorageType::Postgres => Err(StorageError::UnsupportedBackend(
            "postgres feature not enabled".to_string(),
        )),
    }
}
