//! Upsert coordinator: applies computed rollups to storage.
//!
//! Every write goes through the store's native insert-or-replace keyed by
//! the table's unique constraint - never read-then-write - so two racing
//! writers for the same partition serialize at the statement and the stored
//! row is always exactly one attempt's complete output.
//!
//! The daily row and the per-product rows run in independent transactions:
//! partial failure of one side never rolls back the other, and a failed
//! side is independently retryable (the next cycle recomputes everything).

use std::sync::Arc;

use backon::Retryable;
use tracing::warn;

use crate::error::EngineError;
use crate::guard;
use crate::interfaces::{RollupStore, StorageError};
use crate::model::{DailyRollup, ProductRollup};
use crate::utils::retry::upsert_backoff;

/// Applies accumulated rollups through a [`RollupStore`].
pub struct UpsertCoordinator {
    rollups: Arc<dyn RollupStore>,
}

impl UpsertCoordinator {
    pub fn new(rollups: Arc<dyn RollupStore>) -> Self {
        Self { rollups }
    }

    /// Upsert the `unified_metrics_daily` row for one partition.
    ///
    /// Transient storage failures are retried locally with backoff before
    /// escalating; a tenant foreign-key violation is classified as a
    /// missing reference and never retried.
    pub async fn apply_daily(&self, rollup: &DailyRollup) -> Result<(), EngineError> {
        let partition = rollup.partition.clone();
        (|| async { self.rollups.upsert_daily(rollup).await })
            .retry(upsert_backoff())
            .when(|e: &StorageError| !guard::is_foreign_key_violation(e))
            .notify(|err: &StorageError, dur: std::time::Duration| {
                warn!(partition = %partition, error = %err, delay = ?dur, "Daily upsert failed, retrying");
            })
            .await
            .map_err(|e| guard::classify_write_error(e, rollup.partition.tenant_id))
    }

    /// Upsert the `product_metrics` rows for one combined partition.
    ///
    /// Each row is its own transaction. The first escalated failure is
    /// returned; rows already written stay written, and the partition-level
    /// retry recomputes the full set idempotently.
    pub async fn apply_products(&self, products: &[ProductRollup]) -> Result<(), EngineError> {
        for product in products {
            let label = product.product_external_id.clone();
            (|| async { self.rollups.upsert_product(product).await })
                .retry(upsert_backoff())
                .when(|e: &StorageError| !guard::is_foreign_key_violation(e))
                .notify(|err: &StorageError, dur: std::time::Duration| {
                    warn!(product = %label, error = %err, delay = ?dur, "Product upsert failed, retrying");
                })
                .await
                .map_err(|e| guard::classify_write_error(e, product.tenant_id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::model::{PartitionKey, PartitionSnapshot};
    use crate::storage::mock::InMemoryRollupStore;

    fn rollup(tenant: Uuid) -> DailyRollup {
        let snapshot = PartitionSnapshot {
            partition: PartitionKey::new(
                tenant,
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                Some("shopify".to_string()),
            ),
            orders: vec![],
            items: vec![],
            products: HashMap::new(),
            ad_spend: Decimal::ZERO,
            inventory_value: Decimal::ZERO,
        };
        crate::accumulator::accumulate_daily(&snapshot)
    }

    #[tokio::test]
    async fn test_apply_daily_inserts_row() {
        let store = Arc::new(InMemoryRollupStore::default());
        let coordinator = UpsertCoordinator::new(store.clone());
        let rollup = rollup(Uuid::new_v4());

        coordinator.apply_daily(&rollup).await.unwrap();

        let stored = store.fetch_daily(&rollup.partition).await.unwrap().unwrap();
        assert_eq!(stored.rollup.total_orders, 0);
    }

    #[tokio::test]
    async fn test_apply_daily_preserves_created_at() {
        let store = Arc::new(InMemoryRollupStore::default());
        let coordinator = UpsertCoordinator::new(store.clone());
        let rollup = rollup(Uuid::new_v4());

        coordinator.apply_daily(&rollup).await.unwrap();
        let first = store.fetch_daily(&rollup.partition).await.unwrap().unwrap();

        coordinator.apply_daily(&rollup).await.unwrap();
        let second = store.fetch_daily(&rollup.partition).await.unwrap().unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_apply_daily_retries_transient_failures() {
        let store = Arc::new(InMemoryRollupStore::default());
        store.fail_next_daily(2);
        let coordinator = UpsertCoordinator::new(store.clone());
        let rollup = rollup(Uuid::new_v4());

        coordinator.apply_daily(&rollup).await.unwrap();

        assert!(store.fetch_daily(&rollup.partition).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_apply_daily_escalates_after_exhausted_retries() {
        let store = Arc::new(InMemoryRollupStore::default());
        store.fail_next_daily(10);
        let coordinator = UpsertCoordinator::new(store.clone());
        let rollup = rollup(Uuid::new_v4());

        let err = coordinator.apply_daily(&rollup).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(store.fetch_daily(&rollup.partition).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_products_independent_rows() {
        let store = Arc::new(InMemoryRollupStore::default());
        let coordinator = UpsertCoordinator::new(store.clone());
        let tenant = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let products = vec![
            ProductRollup {
                tenant_id: tenant,
                product_external_id: "p1".to_string(),
                sku: "sku-p1".to_string(),
                date,
                revenue: Decimal::new(1000, 2),
                units_sold: 2,
                conversion_rate: Decimal::ZERO,
                buy_box_percent: Decimal::ZERO,
            },
            ProductRollup {
                tenant_id: tenant,
                product_external_id: "p2".to_string(),
                sku: "sku-p2".to_string(),
                date,
                revenue: Decimal::new(500, 2),
                units_sold: 1,
                conversion_rate: Decimal::ZERO,
                buy_box_percent: Decimal::ZERO,
            },
        ];

        coordinator.apply_products(&products).await.unwrap();

        let stored = store.fetch_products_for_day(tenant, date).await.unwrap();
        assert_eq!(stored.len(), 2);
    }
}
