//! Unified record read interface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{PartitionKey, PartitionSnapshot};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(any(feature = "postgres", feature = "sqlite"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid decimal in column {column}: {value}")]
    InvalidDecimal { column: String, value: String },

    #[error("Invalid date in column {column}: {value}")]
    InvalidDate { column: String, value: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported storage type: {0}")]
    UnsupportedBackend(String),
}

/// Interface for reading unified commerce records.
///
/// The unified tables are written by ingestion and are strictly read-only
/// from the engine's perspective: there is never write-write contention
/// between a cycle and the connectors.
///
/// Implementations:
/// - `SqlRecordStore<Postgres>`: PostgreSQL
/// - `SqlRecordStore<Sqlite>`: SQLite
/// - `InMemoryRecordStore`: tests
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read everything one partition's recomputation needs in one pass:
    /// orders and items restricted to the partition, the latest product
    /// facts for the tenant/platform, and the inventory value supplied by
    /// the latest inventory snapshot.
    ///
    /// The returned snapshot's `ad_spend` is zero; the caller fills it from
    /// an [`super::AdSpendSource`].
    async fn fetch_partition(&self, partition: &PartitionKey) -> Result<PartitionSnapshot>;

    /// Whether the tenant row still exists.
    async fn tenant_exists(&self, tenant_id: Uuid) -> Result<bool>;

    /// All tenant ids, for whole-fleet recomputation (nightly rollups).
    async fn list_tenants(&self) -> Result<Vec<Uuid>>;

    /// Platforms with at least one order for the tenant on the given date.
    ///
    /// Backfill uses this to seed the per-platform partitions alongside the
    /// combined one.
    async fn active_platforms(
        &self,
        tenant_id: Uuid,
        date: chrono::NaiveDate,
    ) -> Result<Vec<String>>;
}
