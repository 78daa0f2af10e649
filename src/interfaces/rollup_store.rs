//! Rollup persistence interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::record_store::Result;
use crate::model::{DailyRollup, PartitionKey, ProductRollup};

/// A daily rollup row as stored, including the timestamps the engine
/// maintains (`created_at` preserved across upserts, `updated_at` touched
/// on every write).
#[derive(Debug, Clone)]
pub struct StoredDailyRollup {
    pub rollup: DailyRollup,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Interface for rollup persistence.
///
/// The rollup tables are the only entities this crate mutates. Every write
/// is a single-statement native upsert keyed by the table's unique
/// constraint, so readers always observe a fully-formed row - either the
/// prior one or the new one, never a partial merge.
///
/// Implementations:
/// - `SqlRollupStore<Postgres>`: PostgreSQL
/// - `SqlRollupStore<Sqlite>`: SQLite
/// - `InMemoryRollupStore`: tests
#[async_trait]
pub trait RollupStore: Send + Sync {
    /// Insert-or-replace the `unified_metrics_daily` row keyed by
    /// `(tenant_id, date, platform)`. Non-key fields are fully replaced;
    /// `created_at` is set only on first insert.
    async fn upsert_daily(&self, rollup: &DailyRollup) -> Result<()>;

    /// Insert-or-replace one `product_metrics` row keyed by
    /// `(tenant_id, product_external_id, date)`, in its own transaction,
    /// independent from the daily row.
    async fn upsert_product(&self, rollup: &ProductRollup) -> Result<()>;

    /// Read back the stored daily row for a partition, if any.
    async fn fetch_daily(&self, partition: &PartitionKey) -> Result<Option<StoredDailyRollup>>;

    /// Read back all product rows for one tenant/day, ordered by product id.
    async fn fetch_products_for_day(
        &self,
        tenant_id: uuid::Uuid,
        date: chrono::NaiveDate,
    ) -> Result<Vec<ProductRollup>>;
}
