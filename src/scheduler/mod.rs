//! Aggregation scheduler.
//!
//! Tracks dirty partitions, deduplicates marks, and drives recomputation
//! through a bounded worker pool. Per-partition claims make same-key
//! recomputation mutually exclusive while unrelated partitions run fully
//! parallel; there is no global lock.
//!
//! ## Failure handling
//!
//! A transient failure re-marks the partition dirty and schedules the next
//! automatic attempt after bounded exponential backoff. After `max_retries`
//! consecutive failures the partition is quarantined: surfaced to the sink
//! and excluded from automatic retry until [`AggregationScheduler::requeue`]
//! re-admits it. A missing tenant drops the partition outright - the
//! cascade already removed its rows, so there is nothing to compute.
//!
//! ## Cancellation
//!
//! Dropping an in-flight cycle (daemon shutdown) aborts its worker tasks.
//! Rollup writes are single-statement upserts, so an aborted attempt either
//! committed whole or left the prior row untouched; no partial row is ever
//! visible.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use backon::Retryable;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::accumulator;
use crate::config::SchedulerConfig;
use crate::error::EngineError;
use crate::guard;
use crate::interfaces::{AdSpendSource, RecordStore, RollupStore};
use crate::model::{PartitionKey, QualityFlag};
use crate::sink::{CycleReport, PartitionFailure, RollupSink};
use crate::upsert::UpsertCoordinator;
use crate::utils::retry::{cycle_retry_delay, read_backoff};

/// Retry bookkeeping for one partition.
struct FailureState {
    consecutive: u32,
    next_attempt: Instant,
}

impl Default for FailureState {
    fn default() -> Self {
        Self {
            consecutive: 0,
            next_attempt: Instant::now(),
        }
    }
}

/// Dirty-set state behind one lock: the dedup map, per-partition retry
/// state, and the quarantine set.
#[derive(Default)]
struct DirtyState {
    dirty: HashMap<PartitionKey, DateTime<Utc>>,
    failures: HashMap<PartitionKey, FailureState>,
    quarantined: HashSet<PartitionKey>,
}

type Claims = Arc<StdMutex<HashSet<PartitionKey>>>;

/// Releases a partition claim when the holding attempt finishes, even if
/// the worker task is aborted mid-flight.
struct ClaimGuard {
    claims: Claims,
    key: PartitionKey,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let mut set = match self.claims.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.key);
    }
}

fn try_claim(claims: &Claims, key: &PartitionKey) -> Option<ClaimGuard> {
    let mut set = match claims.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if set.insert(key.clone()) {
        Some(ClaimGuard {
            claims: Arc::clone(claims),
            key: key.clone(),
        })
    } else {
        None
    }
}

/// Drives dirty-partition recomputation.
pub struct AggregationScheduler {
    config: SchedulerConfig,
    records: Arc<dyn RecordStore>,
    ad_spend: Arc<dyn AdSpendSource>,
    sink: Arc<dyn RollupSink>,
    upserts: Arc<UpsertCoordinator>,
    state: Arc<Mutex<DirtyState>>,
    claims: Claims,
    workers: Arc<Semaphore>,
}

impl AggregationScheduler {
    pub fn new(
        config: SchedulerConfig,
        records: Arc<dyn RecordStore>,
        rollups: Arc<dyn RollupStore>,
        ad_spend: Arc<dyn AdSpendSource>,
        sink: Arc<dyn RollupSink>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let workers = Arc::new(Semaphore::new(config.workers));
        Ok(Self {
            config,
            records,
            ad_spend,
            sink,
            upserts: Arc::new(UpsertCoordinator::new(rollups)),
            state: Arc::new(Mutex::new(DirtyState::default())),
            claims: Arc::new(StdMutex::new(HashSet::new())),
            workers,
        })
    }

    /// Record that a partition's source data changed.
    ///
    /// Repeated marks for the same key before a cycle collapse to one unit
    /// of work; the stored timestamp is the earliest mark. Marking a
    /// platform partition implicitly marks the combined (all-platforms)
    /// partition, since both rows derive from the same source change.
    pub async fn mark_dirty(&self, tenant_id: Uuid, date: NaiveDate, platform: Option<&str>) {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        if let Some(platform) = platform {
            let key = PartitionKey::new(tenant_id, date, Some(platform.to_string()));
            debug!(partition = %key, "Partition marked dirty");
            state.dirty.entry(key).or_insert(now);
        }
        state
            .dirty
            .entry(PartitionKey::new(tenant_id, date, None))
            .or_insert(now);
    }

    /// Mark every partition in a closed date range dirty (backfill).
    ///
    /// Per-platform partitions are discovered from the order data so the
    /// platform breakdown rows are rebuilt alongside the combined rows.
    pub async fn mark_dirty_range(
        &self,
        tenant_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize, EngineError> {
        let mut marked = 0;
        let mut date = start;
        while date <= end {
            let platforms = self.records.active_platforms(tenant_id, date).await?;
            if platforms.is_empty() {
                self.mark_dirty(tenant_id, date, None).await;
                marked += 1;
            } else {
                for platform in &platforms {
                    self.mark_dirty(tenant_id, date, Some(platform)).await;
                }
                marked += platforms.len() + 1;
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(marked)
    }

    /// Re-admit a quarantined partition for automatic processing.
    pub async fn requeue(&self, partition: PartitionKey) {
        let mut state = self.state.lock().await;
        state.quarantined.remove(&partition);
        state.failures.remove(&partition);
        state.dirty.entry(partition).or_insert_with(Utc::now);
    }

    /// Number of partitions currently marked dirty.
    pub async fn dirty_count(&self) -> usize {
        self.state.lock().await.dirty.len()
    }

    /// Partitions currently excluded from automatic retry.
    pub async fn quarantined(&self) -> Vec<PartitionKey> {
        self.state
            .lock()
            .await
            .quarantined
            .iter()
            .cloned()
            .collect()
    }

    /// Process all currently due dirty partitions.
    ///
    /// Idempotent: no dirty partitions is a no-op, and recomputing an
    /// unchanged partition stores identical non-timestamp fields. Returns
    /// the cycle's counts; only a fatal configuration error aborts the
    /// cycle itself.
    pub async fn run_cycle(&self) -> Result<CycleReport, EngineError> {
        let now = Instant::now();
        let due: Vec<PartitionKey> = {
            let mut state = self.state.lock().await;
            let keys: Vec<PartitionKey> = state
                .dirty
                .keys()
                .filter(|key| !state.quarantined.contains(*key))
                .filter(|key| {
                    state
                        .failures
                        .get(*key)
                        .map_or(true, |f| f.next_attempt <= now)
                })
                .cloned()
                .collect();
            for key in &keys {
                state.dirty.remove(key);
            }
            keys
        };

        if due.is_empty() {
            return Ok(CycleReport::default());
        }

        let mut report = CycleReport {
            processed: due.len(),
            ..Default::default()
        };

        let mut tasks: JoinSet<(PartitionKey, Result<Vec<QualityFlag>, EngineError>)> =
            JoinSet::new();

        for key in due {
            // An overlapping cycle still holds this partition: leave it
            // dirty and let the next cycle pick it up.
            let Some(claim) = try_claim(&self.claims, &key) else {
                report.processed -= 1;
                self.state
                    .lock()
                    .await
                    .dirty
                    .entry(key)
                    .or_insert_with(Utc::now);
                continue;
            };

            let Ok(permit) = Arc::clone(&self.workers).acquire_owned().await else {
                return Err(EngineError::FatalConfig(
                    "worker pool closed unexpectedly".to_string(),
                ));
            };

            let records = Arc::clone(&self.records);
            let upserts = Arc::clone(&self.upserts);
            let ad_spend = Arc::clone(&self.ad_spend);
            let budget = self.config.partition_timeout();

            tasks.spawn(async move {
                let outcome = match timeout(
                    budget,
                    recompute_partition(records, upserts, ad_spend, key.clone()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Timeout { budget }),
                };
                drop(claim);
                drop(permit);
                (key, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (key, outcome) = match joined {
                Ok(pair) => pair,
                Err(join_err) => {
                    error!(error = %join_err, "Partition worker task failed to join");
                    report.failed += 1;
                    continue;
                }
            };

            match outcome {
                Ok(flags) => {
                    report.succeeded += 1;
                    self.state.lock().await.failures.remove(&key);
                    if !flags.is_empty() {
                        report.flagged += 1;
                        self.sink.partition_flagged(&key, &flags).await;
                    }
                }
                Err(EngineError::MissingReference { .. }) => {
                    report.dropped += 1;
                    {
                        let mut state = self.state.lock().await;
                        state.dirty.remove(&key);
                        state.failures.remove(&key);
                        state.quarantined.remove(&key);
                    }
                    self.sink
                        .partition_dropped(&key, "tenant no longer exists")
                        .await;
                }
                Err(err) if err.is_retryable() => {
                    report.failed += 1;
                    let (consecutive, quarantined) = {
                        let mut state = self.state.lock().await;
                        let failure = state.failures.entry(key.clone()).or_default();
                        failure.consecutive += 1;
                        let consecutive = failure.consecutive;
                        let quarantined = consecutive >= self.config.max_retries;
                        if !quarantined {
                            failure.next_attempt = Instant::now()
                                + cycle_retry_delay(
                                    consecutive,
                                    self.config.retry_base(),
                                    self.config.retry_max(),
                                );
                        }
                        if quarantined {
                            state.quarantined.insert(key.clone());
                        }
                        state.dirty.entry(key.clone()).or_insert_with(Utc::now);
                        (consecutive, quarantined)
                    };
                    self.sink
                        .partition_failed(&PartitionFailure {
                            partition: key,
                            error: err.to_string(),
                            consecutive_failures: consecutive,
                            quarantined,
                        })
                        .await;
                }
                Err(err) => {
                    // Fatal: abort the remaining work and surface immediately.
                    error!(partition = %key, error = %err, "Fatal error during cycle");
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        self.sink.cycle_completed(&report).await;
        Ok(report)
    }

    /// Run cycles at the configured interval until shutdown.
    ///
    /// Only a fatal configuration error stops the loop from the inside;
    /// per-partition failures stay on the retry path.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), EngineError> {
        info!(
            workers = self.config.workers,
            check_interval = ?self.config.check_interval(),
            "Starting aggregation scheduler"
        );

        let mut ticker = interval(self.config.check_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) if report.processed > 0 => {
                            debug!(
                                processed = report.processed,
                                succeeded = report.succeeded,
                                failed = report.failed,
                                "Cycle finished"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => {
                            error!(error = %err, "Scheduler halting");
                            return Err(err);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping scheduler");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Hold a claim on a partition, as an overlapping cycle would.
    #[cfg(test)]
    fn hold_claim(&self, key: &PartitionKey) -> Option<ClaimGuard> {
        try_claim(&self.claims, key)
    }
}

/// One partition's full recompute: guard, read, fold, validate, upsert.
async fn recompute_partition(
    records: Arc<dyn RecordStore>,
    upserts: Arc<UpsertCoordinator>,
    ad_spend: Arc<dyn AdSpendSource>,
    key: PartitionKey,
) -> Result<Vec<QualityFlag>, EngineError> {
    guard::check_tenant(records.as_ref(), key.tenant_id).await?;

    let mut snapshot = (|| async { records.fetch_partition(&key).await })
        .retry(read_backoff())
        .await?;
    snapshot.ad_spend = ad_spend.ad_spend(&key).await?;

    let mut daily = accumulator::accumulate_daily(&snapshot);
    guard::enforce_rate_ranges(&mut daily);
    let flags = daily.flags.clone();

    upserts.apply_daily(&daily).await?;

    // product_metrics has no platform column; only the combined partition
    // carries the full item set for the day.
    if key.is_combined() {
        let products = accumulator::accumulate_products(&snapshot);
        upserts.apply_products(&products).await?;
    }

    Ok(flags)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use super::*;
    use crate::interfaces::NullAdSpendSource;
    use crate::model::{PartitionSnapshot, UnifiedOrder};
    use crate::sink::CollectorSink;
    use crate::storage::mock::{InMemoryRecordStore, InMemoryRollupStore};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            workers: 4,
            check_interval_secs: 1,
            partition_timeout_secs: 5,
            max_retries: 2,
            retry_base_ms: 1,
            retry_max_ms: 5,
        }
    }

    fn order(tenant: Uuid, platform: &str, net: &str, fulfillment: &str, refund: &str) -> UnifiedOrder {
        UnifiedOrder {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            platform: platform.to_string(),
            external_order_id: Uuid::new_v4().to_string(),
            customer_external_id: None,
            order_number: None,
            order_date: None,
            financial_status: None,
            fulfillment_status: Some(fulfillment.to_string()),
            channel: None,
            gross_sales: Some(dec(net)),
            net_sales: Some(dec(net)),
            total_tax: None,
            discount_amount: None,
            shipping_amount: None,
            refund_amount: Some(dec(refund)),
            total_fees: None,
            net_payout: None,
            currency: "USD".to_string(),
        }
    }

    fn snapshot(partition: PartitionKey, orders: Vec<UnifiedOrder>) -> PartitionSnapshot {
        PartitionSnapshot {
            partition,
            orders,
            items: vec![],
            products: HashMap::new(),
            ad_spend: Decimal::ZERO,
            inventory_value: Decimal::ZERO,
        }
    }

    struct Harness {
        scheduler: AggregationScheduler,
        records: Arc<InMemoryRecordStore>,
        rollups: Arc<InMemoryRollupStore>,
        sink: Arc<CollectorSink>,
    }

    fn harness(config: SchedulerConfig) -> Harness {
        let records = Arc::new(InMemoryRecordStore::default());
        let rollups = Arc::new(InMemoryRollupStore::default());
        let sink = Arc::new(CollectorSink::new());
        let scheduler = AggregationScheduler::new(
            config,
            records.clone(),
            rollups.clone(),
            Arc::new(NullAdSpendSource),
            sink.clone(),
        )
        .unwrap();
        Harness {
            scheduler,
            records,
            rollups,
            sink,
        }
    }

    #[tokio::test]
    async fn test_cycle_with_no_dirty_partitions_is_noop() {
        let h = harness(fast_config());

        let report = h.scheduler.run_cycle().await.unwrap();

        assert_eq!(report, CycleReport::default());
        assert!(h.sink.reports().await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_dirty_deduplicates() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();

        for _ in 0..5 {
            h.scheduler.mark_dirty(tenant, date(), Some("shopify")).await;
        }

        // One platform partition plus the implicit combined partition.
        assert_eq!(h.scheduler.dirty_count().await, 2);
    }

    #[tokio::test]
    async fn test_cycle_commits_worked_example() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;

        let orders = vec![
            order(tenant, "shopify", "100.00", "fulfilled", "0.00"),
            order(tenant, "shopify", "50.00", "fulfilled", "0.00"),
            order(tenant, "shopify", "0.00", "unfulfilled", "50.00"),
        ];
        let platform_key = PartitionKey::new(tenant, date(), Some("shopify".to_string()));
        h.records
            .put_snapshot(snapshot(platform_key.clone(), orders.clone()))
            .await;
        h.records
            .put_snapshot(snapshot(platform_key.combined(), orders))
            .await;

        h.scheduler.mark_dirty(tenant, date(), Some("shopify")).await;
        let report = h.scheduler.run_cycle().await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded, 2);

        let stored = h.rollups.fetch_daily(&platform_key).await.unwrap().unwrap();
        assert_eq!(stored.rollup.total_orders, 3);
        assert_eq!(stored.rollup.net_sales, dec("150.00"));
        assert_eq!(stored.rollup.refunds, dec("50.00"));
        assert_eq!(stored.rollup.aov, dec("50.00"));
        assert_eq!(stored.rollup.fulfillment_rate, dec("0.6667"));
        assert_eq!(stored.rollup.refund_rate, dec("0.3333"));
        assert_eq!(h.scheduler.dirty_count().await, 0);
    }

    #[tokio::test]
    async fn test_recomputation_is_idempotent() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;
        let key = PartitionKey::new(tenant, date(), Some("amazon".to_string()));
        h.records
            .put_snapshot(snapshot(
                key.clone(),
                vec![order(tenant, "amazon", "42.00", "fulfilled", "0.00")],
            ))
            .await;

        h.scheduler.mark_dirty(tenant, date(), Some("amazon")).await;
        h.scheduler.run_cycle().await.unwrap();
        let first = h.rollups.fetch_daily(&key).await.unwrap().unwrap();

        h.scheduler.mark_dirty(tenant, date(), Some("amazon")).await;
        h.scheduler.run_cycle().await.unwrap();
        let second = h.rollups.fetch_daily(&key).await.unwrap().unwrap();

        assert_eq!(first.rollup, second.rollup);
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_transient_failures_backoff_then_quarantine() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;
        // Each attempt performs one read, retried 3 times locally; keep the
        // store failing long enough to exhaust both attempts.
        h.records.fail_next_reads(100);

        h.scheduler.mark_dirty(tenant, date(), None).await;

        let report = h.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(h.scheduler.quarantined().await.is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let report = h.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        // max_retries = 2: second consecutive failure quarantines.
        assert_eq!(h.scheduler.quarantined().await.len(), 1);

        // Quarantined partitions are excluded from automatic retry.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let report = h.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.processed, 0);

        let failures = h.sink.failures().await;
        assert!(failures.last().unwrap().quarantined);
    }

    #[tokio::test]
    async fn test_requeue_readmits_quarantined_partition() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;
        h.records.fail_next_reads(100);
        let key = PartitionKey::new(tenant, date(), None);

        h.scheduler.mark_dirty(tenant, date(), None).await;
        h.scheduler.run_cycle().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        h.scheduler.run_cycle().await.unwrap();
        assert_eq!(h.scheduler.quarantined().await.len(), 1);

        h.records.fail_next_reads(0);
        h.scheduler.requeue(key.clone()).await;

        let report = h.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(h.scheduler.quarantined().await.is_empty());
        assert!(h.rollups.fetch_daily(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_tenant_drops_partition() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        // Tenant never added: simulates concurrent delete before the cycle.

        h.scheduler.mark_dirty(tenant, date(), Some("walmart")).await;
        let report = h.scheduler.run_cycle().await.unwrap();

        assert_eq!(report.dropped, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(h.scheduler.dirty_count().await, 0);
        assert_eq!(h.sink.dropped().await.len(), 2);
        assert_eq!(h.rollups.daily_count().await, 0);
    }

    #[tokio::test]
    async fn test_claimed_partition_is_skipped_and_stays_dirty() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;
        let key = PartitionKey::new(tenant, date(), None);

        let claim = h.scheduler.hold_claim(&key).unwrap();
        h.scheduler.mark_dirty(tenant, date(), None).await;

        let report = h.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(h.scheduler.dirty_count().await, 1);

        drop(claim);
        let report = h.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn test_flagged_partition_reported_but_committed() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;
        let key = PartitionKey::new(tenant, date(), None);
        // Refund exceeds sales: clamped and flagged, never rejected.
        h.records
            .put_snapshot(snapshot(
                key.clone(),
                vec![order(tenant, "shopify", "10.00", "fulfilled", "40.00")],
            ))
            .await;

        h.scheduler.mark_dirty(tenant, date(), None).await;
        let report = h.scheduler.run_cycle().await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.flagged, 1);
        assert_eq!(h.sink.flagged().await.len(), 1);
        let stored = h.rollups.fetch_daily(&key).await.unwrap().unwrap();
        assert_eq!(stored.rollup.refund_rate, dec("1.0000"));
    }

    #[tokio::test]
    async fn test_combined_partition_writes_product_metrics() {
        use crate::model::UnifiedOrderItem;

        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;
        let key = PartitionKey::new(tenant, date(), None);
        let o = order(tenant, "shopify", "60.00", "fulfilled", "0.00");
        let item = UnifiedOrderItem {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            order_id: o.id,
            platform: Some("shopify".to_string()),
            external_line_id: None,
            product_external_id: Some("p1".to_string()),
            sku: Some("sku-p1".to_string()),
            quantity: Some(dec("2")),
            price: None,
            total: Some(dec("60.00")),
            discount: None,
            tax: None,
        };
        let mut snap = snapshot(key.clone(), vec![o]);
        snap.items = vec![item];
        h.records.put_snapshot(snap).await;

        h.scheduler.mark_dirty(tenant, date(), None).await;
        h.scheduler.run_cycle().await.unwrap();

        let products = h.rollups.fetch_products_for_day(tenant, date()).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].revenue, dec("60.00"));
        assert_eq!(products[0].units_sold, 2);
    }

    #[tokio::test]
    async fn test_backfill_marks_range() {
        let h = harness(fast_config());
        let tenant = Uuid::new_v4();
        h.records.add_tenant(tenant).await;
        let start = date();
        let end = start + chrono::Days::new(2);
        h.records
            .put_snapshot(snapshot(
                PartitionKey::new(tenant, start, Some("shopify".to_string())),
                vec![order(tenant, "shopify", "10.00", "fulfilled", "0.00")],
            ))
            .await;

        let marked = h.scheduler.mark_dirty_range(tenant, start, end).await.unwrap();

        // Day 1: shopify + combined; days 2-3: combined only.
        assert_eq!(marked, 4);
        assert_eq!(h.scheduler.dirty_count().await, 4);
    }
}
