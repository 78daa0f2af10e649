//! In-memory storage implementations for tests.
//!
//! Both stores support transient-failure injection so retry paths can be
//! exercised without a real database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::interfaces::record_store::Result;
use crate::interfaces::{RecordStore, RollupStore, StorageError, StoredDailyRollup};
use crate::model::{DailyRollup, PartitionKey, PartitionSnapshot, ProductRollup};

fn take_failure(counter: &AtomicUsize) -> Option<StorageError> {
    // Decrement-if-positive; races are irrelevant in tests.
    if counter.load(Ordering::SeqCst) > 0 {
        counter.fetch_sub(1, Ordering::SeqCst);
        Some(StorageError::Unavailable("injected failure".to_string()))
    } else {
        None
    }
}

/// In-memory implementation of [`RecordStore`].
///
/// Partitions are pre-seeded with [`PartitionSnapshot`]s; unseeded
/// partitions read back empty (zero orders).
#[derive(Default)]
pub struct InMemoryRecordStore {
    tenants: RwLock<HashSet<Uuid>>,
    snapshots: RwLock<HashMap<PartitionKey, PartitionSnapshot>>,
    fail_reads: AtomicUsize,
}

impl InMemoryRecordStore {
    pub async fn add_tenant(&self, tenant_id: Uuid) {
        self.tenants.write().await.insert(tenant_id);
    }

    pub async fn remove_tenant(&self, tenant_id: Uuid) {
        self.tenants.write().await.remove(&tenant_id);
    }

    /// Seed the snapshot returned for its partition key.
    pub async fn put_snapshot(&self, snapshot: PartitionSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.partition.clone(), snapshot);
    }

    /// Fail the next `n` reads with a transient error.
    pub fn fail_next_reads(&self, n: usize) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_partition(&self, partition: &PartitionKey) -> Result<PartitionSnapshot> {
        if let Some(err) = take_failure(&self.fail_reads) {
            return Err(err);
        }
        Ok(self
            .snapshots
            .read()
            .await
            .get(partition)
            .cloned()
            .unwrap_or_else(|| PartitionSnapshot {
                partition: partition.clone(),
                orders: vec![],
                items: vec![],
                products: HashMap::new(),
                ad_spend: Decimal::ZERO,
                inventory_value: Decimal::ZERO,
            }))
    }

    async fn tenant_exists(&self, tenant_id: Uuid) -> Result<bool> {
        Ok(self.tenants.read().await.contains(&tenant_id))
    }

    async fn list_tenants(&self) -> Result<Vec<Uuid>> {
        let mut tenants: Vec<Uuid> = self.tenants.read().await.iter().copied().collect();
        tenants.sort();
        Ok(tenants)
    }

    async fn active_platforms(&self, tenant_id: Uuid, date: NaiveDate) -> Result<Vec<String>> {
        let snapshots = self.snapshots.read().await;
        let mut platforms: Vec<String> = snapshots
            .keys()
            .filter(|key| key.tenant_id == tenant_id && key.date == date)
            .filter_map(|key| key.platform.clone())
            .collect();
        platforms.sort();
        platforms.dedup();
        Ok(platforms)
    }
}

/// In-memory implementation of [`RollupStore`].
#[derive(Default)]
pub struct InMemoryRollupStore {
    daily: RwLock<HashMap<PartitionKey, StoredDailyRollup>>,
    products: RwLock<HashMap<(Uuid, String, NaiveDate), ProductRollup>>,
    fail_daily: AtomicUsize,
    fail_products: AtomicUsize,
}

impl InMemoryRollupStore {
    /// Fail the next `n` daily upserts with a transient error.
    pub fn fail_next_daily(&self, n: usize) {
        self.fail_daily.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` product upserts with a transient error.
    pub fn fail_next_products(&self, n: usize) {
        self.fail_products.store(n, Ordering::SeqCst);
    }

    /// Number of daily rows currently stored.
    pub async fn daily_count(&self) -> usize {
        self.daily.read().await.len()
    }
}

#[async_trait]
impl RollupStore for InMemoryRollupStore {
    async fn upsert_daily(&self, rollup: &DailyRollup) -> Result<()> {
        if let Some(err) = take_failure(&self.fail_daily) {
            return Err(err);
        }
        let now = Utc::now();
        let mut daily = self.daily.write().await;
        match daily.get_mut(&rollup.partition) {
            Some(existing) => {
                existing.rollup = rollup.clone();
                existing.updated_at = now;
            }
            None => {
                daily.insert(
                    rollup.partition.clone(),
                    StoredDailyRollup {
                        rollup: rollup.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn upsert_product(&self, rollup: &ProductRollup) -> Result<()> {
        if let Some(err) = take_failure(&self.fail_products) {
            return Err(err);
        }
        let key = (
            rollup.tenant_id,
            rollup.product_external_id.clone(),
            rollup.date,
        );
        self.products.write().await.insert(key, rollup.clone());
        Ok(())
    }

    async fn fetch_daily(&self, partition: &PartitionKey) -> Result<Option<StoredDailyRollup>> {
        Ok(self.daily.read().await.get(partition).cloned())
    }

    async fn fetch_products_for_day(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ProductRollup>> {
        let products = self.products.read().await;
        let mut rows: Vec<ProductRollup> = products
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.date == date)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.product_external_id.cmp(&b.product_external_id));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unseeded_partition_reads_empty() {
        let store = InMemoryRecordStore::default();
        let partition = PartitionKey::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            None,
        );

        let snapshot = store.fetch_partition(&partition).await.unwrap();

        assert!(snapshot.orders.is_empty());
        assert!(snapshot.items.is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection_is_consumed() {
        let store = InMemoryRecordStore::default();
        store.fail_next_reads(1);
        let partition = PartitionKey::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            None,
        );

        assert!(store.fetch_partition(&partition).await.is_err());
        assert!(store.fetch_partition(&partition).await.is_ok());
    }
}
