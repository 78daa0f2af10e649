//! Domain model: partition keys, unified records, and rollup value objects.
//!
//! Unified records mirror the ingestion schema and are read-only from this
//! crate's perspective. Rollup structs are the only values the engine writes.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// The unit of aggregation: one tenant, one day, one platform.
///
/// `platform = None` is the combined partition ("all platforms") for that
/// tenant/date. Product rollups are computed only for combined partitions,
/// since `product_metrics` is not keyed by platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub tenant_id: Uuid,
    pub date: NaiveDate,
    pub platform: Option<String>,
}

impl PartitionKey {
    pub fn new(tenant_id: Uuid, date: NaiveDate, platform: Option<String>) -> Self {
        Self {
            tenant_id,
            date,
            platform,
        }
    }

    /// The combined ("all platforms") partition for the same tenant/date.
    pub fn combined(&self) -> Self {
        Self {
            tenant_id: self.tenant_id,
            date: self.date,
            platform: None,
        }
    }

    /// Whether this is the combined partition.
    pub fn is_combined(&self) -> bool {
        self.platform.is_none()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tenant_id,
            self.date,
            self.platform.as_deref().unwrap_or("all")
        )
    }
}

/// Canonical representation of a sale, normalized across platforms.
///
/// Financial fields are independent numeric facts; none is derived from
/// another here. `None` means the connector did not supply the value and is
/// treated as zero during accumulation.
#[derive(Debug, Clone)]
pub struct UnifiedOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub platform: String,
    pub external_order_id: String,
    pub customer_external_id: Option<String>,
    pub order_number: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub channel: Option<String>,
    pub gross_sales: Option<Decimal>,
    pub net_sales: Option<Decimal>,
    pub total_tax: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub shipping_amount: Option<Decimal>,
    pub refund_amount: Option<Decimal>,
    pub total_fees: Option<Decimal>,
    pub net_payout: Option<Decimal>,
    pub currency: String,
}

/// One line of a unified order.
#[derive(Debug, Clone)]
pub struct UnifiedOrderItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub platform: Option<String>,
    pub external_line_id: Option<String>,
    pub product_external_id: Option<String>,
    pub sku: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub total: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
}

/// Latest per-product facts for a tenant/platform, used for cost resolution
/// and rate pass-through.
#[derive(Debug, Clone, Default)]
pub struct ProductFacts {
    pub product_external_id: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub is_suppressed: bool,
    pub buy_box_percent: Option<Decimal>,
    pub conversion_rate: Option<Decimal>,
}

/// Everything the accumulator needs for one partition, read in one pass.
///
/// `ad_spend` and `inventory_value` are supplied by external collaborators
/// (ad-platform source, inventory snapshot) and passed through as given.
#[derive(Debug, Clone)]
pub struct PartitionSnapshot {
    pub partition: PartitionKey,
    pub orders: Vec<UnifiedOrder>,
    pub items: Vec<UnifiedOrderItem>,
    /// Latest product facts keyed by `product_external_id`.
    pub products: HashMap<String, ProductFacts>,
    pub ad_spend: Decimal,
    pub inventory_value: Decimal,
}

/// Data-quality annotations attached to a committed rollup.
///
/// Flags never block a write; they are surfaced through the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityFlag {
    /// An item's product cost could not be resolved; its cost contribution
    /// was treated as zero.
    IncompleteCost { product_external_id: String },
    /// A derived rate fell outside its documented range and was clamped.
    OutOfRangeRate { field: String, value: String },
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityFlag::IncompleteCost {
                product_external_id,
            } => write!(f, "incomplete_cost({})", product_external_id),
            QualityFlag::OutOfRangeRate { field, value } => {
                write!(f, "out_of_range_rate({}={})", field, value)
            }
        }
    }
}

/// One row of `unified_metrics_daily`, fully recomputed per cycle.
///
/// Additive fields are exact sums over the partition's records; derived
/// fields are ratios of those sums. Money is rounded half-even to 2 decimal
/// places, rates to 4, at construction time only.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRollup {
    pub partition: PartitionKey,
    pub total_orders: i64,
    pub total_sales: Decimal,
    pub net_sales: Decimal,
    pub discounts: Decimal,
    pub taxes: Decimal,
    pub refunds: Decimal,
    pub units_sold: i64,
    pub ad_spend: Decimal,
    pub inventory_value: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub aov: Decimal,
    pub fulfillment_rate: Decimal,
    pub refund_rate: Decimal,
    /// Quality annotations for the sink; not persisted on the row.
    pub flags: Vec<QualityFlag>,
}

/// One row of `product_metrics`, scoped to one product and one day.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRollup {
    pub tenant_id: Uuid,
    pub product_external_id: String,
    pub sku: String,
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub units_sold: i64,
    pub conversion_rate: Decimal,
    pub buy_box_percent: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_combined() {
        let key = PartitionKey::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            Some("shopify".to_string()),
        );

        let combined = key.combined();

        assert!(!key.is_combined());
        assert!(combined.is_combined());
        assert_eq!(combined.tenant_id, key.tenant_id);
        assert_eq!(combined.date, key.date);
    }

    #[test]
    fn test_partition_key_display() {
        let tenant = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let platform = PartitionKey::new(tenant, date, Some("amazon".to_string()));
        let combined = PartitionKey::new(tenant, date, None);

        assert!(platform.to_string().ends_with("/amazon"));
        assert!(combined.to_string().ends_with("/all"));
    }

    #[test]
    fn test_quality_flag_display() {
        let flag = QualityFlag::IncompleteCost {
            product_external_id: "sku-9".to_string(),
        };
        assert_eq!(flag.to_string(), "incomplete_cost(sku-9)");
    }
}
