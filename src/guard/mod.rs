//! Consistency guard: pre-commit validation and write-error classification.
//!
//! Three jobs, per the engine's commit protocol:
//! - the referenced tenant must still exist before a rollup is computed;
//! - derived rates must lie in [0, 1] or carry an explicit flag - nothing
//!   is ever clamped silently;
//! - a write that trips the tenant foreign key lost a race with a tenant
//!   delete: classified as a non-retryable missing reference so the
//!   scheduler drops the partition instead of retrying into a wall.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::EngineError;
use crate::interfaces::{RecordStore, StorageError};
use crate::model::{DailyRollup, QualityFlag};

/// Verify the partition's tenant still exists.
///
/// Absence means a cascade delete already removed the tenant's rows; the
/// partition must be dropped, not retried.
pub async fn check_tenant(
    records: &dyn RecordStore,
    tenant_id: Uuid,
) -> Result<(), EngineError> {
    if records.tenant_exists(tenant_id).await? {
        Ok(())
    } else {
        Err(EngineError::MissingReference { tenant_id })
    }
}

/// Clamp any rate outside [0, 1] and flag the clamping.
///
/// The accumulator already guards its own derivations; this is the last
/// line before commit, so an out-of-range value can only leave the engine
/// annotated.
pub fn enforce_rate_ranges(rollup: &mut DailyRollup) {
    let mut out_of_range = Vec::new();
    for (field, value) in [
        ("fulfillment_rate", &mut rollup.fulfillment_rate),
        ("refund_rate", &mut rollup.refund_rate),
    ] {
        let clamped = (*value).clamp(Decimal::ZERO, Decimal::ONE);
        if clamped != *value {
            out_of_range.push((field.to_string(), value.to_string()));
            *value = clamped;
        }
    }
    for (field, value) in out_of_range {
        let already_flagged = rollup.flags.iter().any(
            |f| matches!(f, QualityFlag::OutOfRangeRate { field: existing, .. } if *existing == field),
        );
        if !already_flagged {
            rollup.flags.push(QualityFlag::OutOfRangeRate { field, value });
        }
    }
}

/// Classify a storage failure from a rollup write.
///
/// A foreign-key violation on `tenant_id` means the tenant vanished between
/// the existence check and the write; everything else is transient.
pub fn classify_write_error(err: StorageError, tenant_id: Uuid) -> EngineError {
    if is_foreign_key_violation(&err) {
        EngineError::MissingReference { tenant_id }
    } else {
        EngineError::Transient(err)
    }
}

/// Whether a storage error is a foreign-key constraint violation.
///
/// PostgreSQL reports SQLSTATE 23503; SQLite reports extended code 787 or
/// the literal "FOREIGN KEY constraint failed" message.
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub fn is_foreign_key_violation(err: &StorageError) -> bool {
    match err {
        StorageError::Database(db_err) => match db_err.as_database_error() {
            Some(db) => {
                matches!(db.code().as_deref(), Some("23503") | Some("787"))
                    || db.message().contains("FOREIGN KEY constraint failed")
            }
            None => false,
        },
        _ => false,
    }
}

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
pub fn is_foreign_key_violation(_err: &StorageError) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::model::{PartitionKey, PartitionSnapshot};
    use crate::storage::mock::InMemoryRecordStore;

    fn rollup_with_rates(fulfillment: &str, refund: &str) -> DailyRollup {
        let partition = PartitionKey::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            None,
        );
        let snapshot = PartitionSnapshot {
            partition,
            orders: vec![],
            items: vec![],
            products: HashMap::new(),
            ad_spend: Decimal::ZERO,
            inventory_value: Decimal::ZERO,
        };
        let mut rollup = crate::accumulator::accumulate_daily(&snapshot);
        rollup.fulfillment_rate = fulfillment.parse().unwrap();
        rollup.refund_rate = refund.parse().unwrap();
        rollup
    }

    #[tokio::test]
    async fn test_check_tenant_present() {
        let store = Arc::new(InMemoryRecordStore::default());
        let tenant = Uuid::new_v4();
        store.add_tenant(tenant).await;

        assert!(check_tenant(store.as_ref(), tenant).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_tenant_absent_is_missing_reference() {
        let store = Arc::new(InMemoryRecordStore::default());
        let tenant = Uuid::new_v4();

        let err = check_tenant(store.as_ref(), tenant).await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::MissingReference { tenant_id } if tenant_id == tenant
        ));
    }

    #[test]
    fn test_in_range_rates_untouched() {
        let mut rollup = rollup_with_rates("0.6667", "0.3333");

        enforce_rate_ranges(&mut rollup);

        assert_eq!(rollup.fulfillment_rate, "0.6667".parse::<Decimal>().unwrap());
        assert!(rollup.flags.is_empty());
    }

    #[test]
    fn test_out_of_range_rate_clamped_and_flagged() {
        let mut rollup = rollup_with_rates("1.2000", "0.0000");

        enforce_rate_ranges(&mut rollup);

        assert_eq!(rollup.fulfillment_rate, Decimal::ONE);
        assert!(matches!(
            rollup.flags.as_slice(),
            [QualityFlag::OutOfRangeRate { field, .. }] if field == "fulfillment_rate"
        ));
    }

    #[test]
    fn test_already_flagged_rate_not_double_flagged() {
        let mut rollup = rollup_with_rates("0.5000", "1.5000");
        rollup.flags.push(QualityFlag::OutOfRangeRate {
            field: "refund_rate".to_string(),
            value: "1.5000".to_string(),
        });

        enforce_rate_ranges(&mut rollup);

        assert_eq!(rollup.refund_rate, Decimal::ONE);
        assert_eq!(rollup.flags.len(), 1);
    }
}
