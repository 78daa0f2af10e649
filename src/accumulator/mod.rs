//! Metric accumulator: pure folds from partition records to rollup values.
//!
//! No I/O and no side effects; given the same [`PartitionSnapshot`] the same
//! rollup comes out, which is what makes cycle recomputation idempotent.
//!
//! All money stays in `rust_decimal::Decimal` end to end. Sums are carried
//! at full precision; rounding happens exactly once, at output: half-even to
//! 2 decimal places for money, 4 for rates.

use std::collections::{HashMap, HashSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::{
    DailyRollup, PartitionSnapshot, ProductFacts, ProductRollup, QualityFlag, UnifiedOrderItem,
};

/// Fulfillment status value that counts toward the fulfillment rate.
const STATUS_FULFILLED: &str = "fulfilled";

/// Round a monetary amount to NUMERIC(15,2) semantics.
fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Round a rate to NUMERIC(5,4) semantics.
fn rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven)
}

/// Missing connector values count as zero.
fn val(value: Option<Decimal>) -> Decimal {
    value.unwrap_or(Decimal::ZERO)
}

/// Resolve an item's product facts by external id, falling back to SKU.
fn resolve_facts<'a>(
    item: &UnifiedOrderItem,
    products: &'a HashMap<String, ProductFacts>,
    by_sku: &HashMap<&str, &'a ProductFacts>,
) -> Option<&'a ProductFacts> {
    if let Some(id) = item.product_external_id.as_deref() {
        if let Some(facts) = products.get(id) {
            return Some(facts);
        }
    }
    item.sku
        .as_deref()
        .and_then(|sku| by_sku.get(sku))
        .copied()
}

/// Fold one partition's orders and items into a [`DailyRollup`].
///
/// Additive fields are exact sums; derived fields guard division by zero.
/// A refund rate outside [0, 1] is clamped and flagged, never rejected:
/// refunds exceeding sales is a legitimate but notable edge case.
pub fn accumulate_daily(snapshot: &PartitionSnapshot) -> DailyRollup {
    let by_sku: HashMap<&str, &ProductFacts> = snapshot
        .products
        .values()
        .filter_map(|facts| facts.sku.as_deref().map(|sku| (sku, facts)))
        .collect();

    let distinct_orders: HashSet<_> = snapshot.orders.iter().map(|order| order.id).collect();
    let total_orders = distinct_orders.len() as i64;

    let mut total_sales = Decimal::ZERO;
    let mut net_sales = Decimal::ZERO;
    let mut discounts = Decimal::ZERO;
    let mut taxes = Decimal::ZERO;
    let mut refunds = Decimal::ZERO;
    let mut total_fees = Decimal::ZERO;
    let mut fulfilled: i64 = 0;
    let mut seen = HashSet::new();

    for order in &snapshot.orders {
        // Guard against duplicate rows for the same order id.
        if !seen.insert(order.id) {
            continue;
        }
        total_sales += val(order.gross_sales);
        net_sales += val(order.net_sales);
        discounts += val(order.discount_amount);
        taxes += val(order.total_tax);
        refunds += val(order.refund_amount);
        total_fees += val(order.total_fees);
        if order.fulfillment_status.as_deref() == Some(STATUS_FULFILLED) {
            fulfilled += 1;
        }
    }

    let mut flags = Vec::new();
    let mut flagged_products = HashSet::new();
    let mut units = Decimal::ZERO;
    let mut cost_of_goods = Decimal::ZERO;

    for item in &snapshot.items {
        let quantity = val(item.quantity);
        units += quantity;

        let cost = resolve_facts(item, &snapshot.products, &by_sku).and_then(|facts| facts.cost);
        match cost {
            Some(cost) => cost_of_goods += quantity * cost,
            None => {
                let id = item
                    .product_external_id
                    .clone()
                    .or_else(|| item.sku.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                if flagged_products.insert(id.clone()) {
                    flags.push(QualityFlag::IncompleteCost {
                        product_external_id: id,
                    });
                }
            }
        }
    }

    let gross_profit = net_sales - cost_of_goods;
    let net_profit = gross_profit - snapshot.ad_spend - total_fees;

    let aov = if total_orders > 0 {
        net_sales / Decimal::from(total_orders)
    } else {
        Decimal::ZERO
    };

    let fulfillment_rate = if total_orders > 0 {
        Decimal::from(fulfilled) / Decimal::from(total_orders)
    } else {
        Decimal::ZERO
    };

    let raw_refund_rate = if net_sales != Decimal::ZERO {
        refunds / net_sales
    } else {
        Decimal::ZERO
    };
    let refund_rate = raw_refund_rate.clamp(Decimal::ZERO, Decimal::ONE);
    if refund_rate != raw_refund_rate {
        flags.push(QualityFlag::OutOfRangeRate {
            field: "refund_rate".to_string(),
            value: rate(raw_refund_rate).to_string(),
        });
    }

    DailyRollup {
        partition: snapshot.partition.clone(),
        total_orders,
        total_sales: money(total_sales),
        net_sales: money(net_sales),
        discounts: money(discounts),
        taxes: money(taxes),
        refunds: money(refunds),
        units_sold: units.trunc().to_i64().unwrap_or_default(),
        ad_spend: money(snapshot.ad_spend),
        inventory_value: money(snapshot.inventory_value),
        gross_profit: money(gross_profit),
        net_profit: money(net_profit),
        aov: money(aov),
        fulfillment_rate: rate(fulfillment_rate),
        refund_rate: rate(refund_rate),
        flags,
    }
}

/// Fold one combined partition's items into per-product rollups.
///
/// `product_metrics` has no platform column, so this is only meaningful for
/// the combined (all-platforms) partition. Line revenue prefers the stored
/// line total and falls back to price x quantity. Conversion rate and
/// buy-box percent are passed through from the latest product snapshot.
pub fn accumulate_products(snapshot: &PartitionSnapshot) -> Vec<ProductRollup> {
    struct Bucket {
        revenue: Decimal,
        units: Decimal,
        sku: Option<String>,
    }

    let mut buckets: HashMap<String, Bucket> = HashMap::new();

    for item in &snapshot.items {
        let Some(product_id) = item.product_external_id.clone() else {
            // Not attributable to a product; daily totals still count it.
            continue;
        };

        let quantity = val(item.quantity);
        let revenue = item
            .total
            .unwrap_or_else(|| val(item.price) * quantity);

        let bucket = buckets.entry(product_id).or_insert(Bucket {
            revenue: Decimal::ZERO,
            units: Decimal::ZERO,
            sku: None,
        });
        bucket.revenue += revenue;
        bucket.units += quantity;
        if bucket.sku.is_none() {
            bucket.sku = item.sku.clone();
        }
    }

    let mut rollups: Vec<ProductRollup> = buckets
        .into_iter()
        .map(|(product_id, bucket)| {
            let facts = snapshot.products.get(&product_id);
            let sku = bucket
                .sku
                .or_else(|| facts.and_then(|f| f.sku.clone()))
                .unwrap_or_default();

            ProductRollup {
                tenant_id: snapshot.partition.tenant_id,
                product_external_id: product_id,
                sku,
                date: snapshot.partition.date,
                revenue: money(bucket.revenue),
                units_sold: bucket.units.trunc().to_i64().unwrap_or_default(),
                conversion_rate: rate(val(facts.and_then(|f| f.conversion_rate))),
                buy_box_percent: rate(val(facts.and_then(|f| f.buy_box_percent))),
            }
        })
        .collect();

    // Deterministic output order keeps recomputation byte-stable.
    rollups.sort_by(|a, b| a.product_external_id.cmp(&b.product_external_id));
    rollups
}
