//! Observability sink for cycle outcomes.
//!
//! The engine reports per-cycle counts and per-partition events (quality
//! flags, failures, quarantines, drops) to an external error/metrics sink.
//! The default sink logs through `tracing`; tests use the collector.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::model::{PartitionKey, QualityFlag};

/// Counts for one `run_cycle` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Partitions drained from the dirty set this cycle.
    pub processed: usize,
    /// Partitions whose rollups committed.
    pub succeeded: usize,
    /// Partitions that failed and re-entered the retry path.
    pub failed: usize,
    /// Committed partitions that carried quality flags.
    pub flagged: usize,
    /// Partitions dropped because their tenant no longer exists.
    pub dropped: usize,
}

/// Details of one partition's failure.
#[derive(Debug, Clone)]
pub struct PartitionFailure {
    pub partition: PartitionKey,
    /// Rendered error; the sink boundary is external, so no error types leak.
    pub error: String,
    pub consecutive_failures: u32,
    /// Whether this failure tipped the partition into quarantine.
    pub quarantined: bool,
}

/// Destination for cycle reports and partition events.
#[async_trait]
pub trait RollupSink: Send + Sync {
    async fn cycle_completed(&self, report: &CycleReport);

    /// A committed rollup carried data-quality flags (incomplete cost,
    /// out-of-range rate). The row was written; flags only annotate it.
    async fn partition_flagged(&self, partition: &PartitionKey, flags: &[QualityFlag]);

    async fn partition_failed(&self, failure: &PartitionFailure);

    /// A partition was dropped without producing a row (tenant deleted).
    /// Absence, not a zeroed row, is what signals "never computed".
    async fn partition_dropped(&self, partition: &PartitionKey, reason: &str);
}

/// Sink that logs everything through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl RollupSink for TracingSink {
    async fn cycle_completed(&self, report: &CycleReport) {
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            flagged = report.flagged,
            dropped = report.dropped,
            "Aggregation cycle completed"
        );
    }

    async fn partition_flagged(&self, partition: &PartitionKey, flags: &[QualityFlag]) {
        // JSON payload keeps the sink output machine-readable downstream.
        warn!(
            partition = %partition,
            flags = %serde_json::json!(flags),
            "Rollup committed with quality flags"
        );
    }

    async fn partition_failed(&self, failure: &PartitionFailure) {
        if failure.quarantined {
            error!(
                partition = %failure.partition,
                error = %failure.error,
                consecutive_failures = failure.consecutive_failures,
                "Partition quarantined after repeated failures"
            );
        } else {
            warn!(
                partition = %failure.partition,
                error = %failure.error,
                consecutive_failures = failure.consecutive_failures,
                "Partition recomputation failed, will retry"
            );
        }
    }

    async fn partition_dropped(&self, partition: &PartitionKey, reason: &str) {
        warn!(partition = %partition, reason = %reason, "Partition dropped");
    }
}

/// Sink that collects all received events for later inspection.
///
/// Useful for testing to verify what the scheduler surfaced.
#[derive(Default)]
pub struct CollectorSink {
    reports: Arc<RwLock<Vec<CycleReport>>>,
    flagged: Arc<RwLock<Vec<(PartitionKey, Vec<QualityFlag>)>>>,
    failures: Arc<RwLock<Vec<PartitionFailure>>>,
    dropped: Arc<RwLock<Vec<(PartitionKey, String)>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<CycleReport> {
        self.reports.read().await.clone()
    }

    pub async fn flagged(&self) -> Vec<(PartitionKey, Vec<QualityFlag>)> {
        self.flagged.read().await.clone()
    }

    pub async fn failures(&self) -> Vec<PartitionFailure> {
        self.failures.read().await.clone()
    }

    pub async fn dropped(&self) -> Vec<(PartitionKey, String)> {
        self.dropped.read().await.clone()
    }

    /// Clear all collected events.
    pub async fn clear(&self) {
        self.reports.write().await.clear();
        self.flagged.write().await.clear();
        self.failures.write().await.clear();
        self.dropped.write().await.clear();
    }
}

#[async_trait]
impl RollupSink for CollectorSink {
    async fn cycle_completed(&self, report: &CycleReport) {
        self.reports.write().await.push(report.clone());
    }

    async fn partition_flagged(&self, partition: &PartitionKey, flags: &[QualityFlag]) {
        self.flagged
            .write()
            .await
            .push((partition.clone(), flags.to_vec()));
    }

    async fn partition_failed(&self, failure: &PartitionFailure) {
        self.failures.write().await.push(failure.clone());
    }

    async fn partition_dropped(&self, partition: &PartitionKey, reason: &str) {
        self.dropped
            .write()
            .await
            .push((partition.clone(), reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    fn partition() -> PartitionKey {
        PartitionKey::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            None,
        )
    }

    #[tokio::test]
    async fn test_collector_collects_reports() {
        let sink = CollectorSink::new();

        sink.cycle_completed(&CycleReport {
            processed: 2,
            succeeded: 2,
            ..Default::default()
        })
        .await;

        let reports = sink.reports().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].succeeded, 2);
    }

    #[tokio::test]
    async fn test_collector_collects_partition_events() {
        let sink = CollectorSink::new();
        let key = partition();

        sink.partition_flagged(
            &key,
            &[QualityFlag::IncompleteCost {
                product_external_id: "p1".to_string(),
            }],
        )
        .await;
        sink.partition_dropped(&key, "tenant deleted").await;

        assert_eq!(sink.flagged().await.len(), 1);
        assert_eq!(sink.dropped().await.len(), 1);
    }

    #[tokio::test]
    async fn test_collector_clear() {
        let sink = CollectorSink::new();

        sink.cycle_completed(&CycleReport::default()).await;
        sink.clear().await;

        assert!(sink.reports().await.is_empty());
    }
}
