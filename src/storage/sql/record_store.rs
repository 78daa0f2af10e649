//! Unified SQL RecordStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety. The unified
//! tables are ingestion-owned; everything here is read-only.

use std::collections::HashMap;
use std::marker::PhantomData;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;

use super::SqlDatabase;
use crate::model::ProductFacts;

/// SQL-based implementation of RecordStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlRecordStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlRecordStore<DB> {
    /// Create a new SQL record store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// UTC day window rendered as RFC 3339 bounds: [start, end).
fn day_window(date: NaiveDate) -> (String, String) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let end = start + chrono::Duration::days(1);
    (start.to_rfc3339(), end.to_rfc3339())
}

/// One inventory snapshot row, as read.
struct InventoryLevel {
    platform: Option<String>,
    product_external_id: Option<String>,
    sku: Option<String>,
    location: Option<String>,
    on_hand: Decimal,
    updated_at: DateTime<Utc>,
}

/// Value of the latest inventory snapshot: Σ on_hand x product cost over
/// the newest level per (platform, product, location). Levels whose cost
/// cannot be resolved contribute nothing; the snapshot supplies the value,
/// the accumulator only passes it through.
fn inventory_value(
    levels: Vec<InventoryLevel>,
    products: &HashMap<String, ProductFacts>,
) -> Decimal {
    let mut latest: HashMap<(String, String, String), InventoryLevel> = HashMap::new();
    for level in levels {
        let key = (
            level.platform.clone().unwrap_or_default(),
            level
                .product_external_id
                .clone()
                .or_else(|| level.sku.clone())
                .unwrap_or_default(),
            level.location.clone().unwrap_or_default(),
        );
        match latest.get(&key) {
            Some(existing) if existing.updated_at >= level.updated_at => {}
            _ => {
                latest.insert(key, level);
            }
        }
    }

    let by_sku: HashMap<&str, &ProductFacts> = products
        .values()
        .filter_map(|facts| facts.sku.as_deref().map(|sku| (sku, facts)))
        .collect();

    let mut value = Decimal::ZERO;
    for level in latest.values() {
        let facts = level
            .product_external_id
            .as_deref()
            .and_then(|id| products.get(id))
            .or_else(|| {
                level
                    .sku
                    .as_deref()
                    .and_then(|sku| by_sku.get(sku).copied())
            });
        if let Some(cost) = facts.and_then(|f| f.cost) {
            value += level.on_hand * cost;
        }
    }
    value
}

/// Macro to implement RecordStore for a specific SQL backend.
///
/// This eliminates duplication between PostgreSQL and SQLite implementations
/// while maintaining full type safety.
macro_rules! impl_record_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::interfaces::RecordStore for SqlRecordStore<$db_type> {
            async fn fetch_partition(
                &self,
                partition: &crate::model::PartitionKey,
            ) -> crate::interfaces::record_store::Result<crate::model::PartitionSnapshot> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::model::{UnifiedOrder, UnifiedOrderItem};
                use crate::storage::schema::{
                    UnifiedInventory, UnifiedOrderItems, UnifiedOrders, UnifiedProducts,
                };

                let (day_start, day_end) = day_window(partition.date);
                let tenant = partition.tenant_id.to_string();

                let sql = {
                    let mut stmt = Query::select();
                    stmt.columns([
                        UnifiedOrders::Id,
                        UnifiedOrders::TenantId,
                        UnifiedOrders::Platform,
                        UnifiedOrders::ExternalOrderId,
                        UnifiedOrders::CustomerExternalId,
                        UnifiedOrders::OrderNumber,
                        UnifiedOrders::OrderDate,
                        UnifiedOrders::FinancialStatus,
                        UnifiedOrders::FulfillmentStatus,
                        UnifiedOrders::Channel,
                        UnifiedOrders::GrossSales,
                        UnifiedOrders::NetSales,
                        UnifiedOrders::TotalTax,
                        UnifiedOrders::DiscountAmount,
                        UnifiedOrders::ShippingAmount,
                        UnifiedOrders::RefundAmount,
                        UnifiedOrders::TotalFees,
                        UnifiedOrders::NetPayout,
                        UnifiedOrders::Currency,
                    ])
                    .from(UnifiedOrders::Table)
                    .and_where(Expr::col(UnifiedOrders::TenantId).eq(tenant.as_str()))
                    .and_where(Expr::col(UnifiedOrders::OrderDate).gte(day_start.as_str()))
                    .and_where(Expr::col(UnifiedOrders::OrderDate).lt(day_end.as_str()));
                    if let Some(platform) = partition.platform.as_deref() {
                        stmt.and_where(Expr::col(UnifiedOrders::Platform).eq(platform));
                    }
                    <$db_type>::build_select(stmt)
                };
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                let mut orders = Vec::with_capacity(rows.len());
                for row in rows {
                    orders.push(UnifiedOrder {
                        id: <$db_type>::uuid(&row, "id")?,
                        tenant_id: <$db_type>::uuid(&row, "tenant_id")?,
                        platform: row.try_get("platform")?,
                        external_order_id: row.try_get("external_order_id")?,
                        customer_external_id: row.try_get("customer_external_id")?,
                        order_number: row.try_get("order_number")?,
                        order_date: <$db_type>::opt_timestamp(&row, "order_date")?,
                        financial_status: row.try_get("financial_status")?,
                        fulfillment_status: row.try_get("fulfillment_status")?,
                        channel: row.try_get("channel")?,
                        gross_sales: <$db_type>::opt_decimal(&row, "gross_sales")?,
                        net_sales: <$db_type>::opt_decimal(&row, "net_sales")?,
                        total_tax: <$db_type>::opt_decimal(&row, "total_tax")?,
                        discount_amount: <$db_type>::opt_decimal(&row, "discount_amount")?,
                        shipping_amount: <$db_type>::opt_decimal(&row, "shipping_amount")?,
                        refund_amount: <$db_type>::opt_decimal(&row, "refund_amount")?,
                        total_fees: <$db_type>::opt_decimal(&row, "total_fees")?,
                        net_payout: <$db_type>::opt_decimal(&row, "net_payout")?,
                        currency: row.try_get("currency")?,
                    });
                }

                let mut items = Vec::new();
                if !orders.is_empty() {
                    let order_ids: Vec<String> =
                        orders.iter().map(|order| order.id.to_string()).collect();

                    let stmt = Query::select()
                        .columns([
                            UnifiedOrderItems::Id,
                            UnifiedOrderItems::TenantId,
                            UnifiedOrderItems::OrderId,
                            UnifiedOrderItems::Platform,
                            UnifiedOrderItems::ExternalLineId,
                            UnifiedOrderItems::ProductExternalId,
                            UnifiedOrderItems::Sku,
                            UnifiedOrderItems::Quantity,
                            UnifiedOrderItems::Price,
                            UnifiedOrderItems::Total,
                            UnifiedOrderItems::Discount,
                            UnifiedOrderItems::Tax,
                        ])
                        .from(UnifiedOrderItems::Table)
                        .and_where(Expr::col(UnifiedOrderItems::OrderId).is_in(order_ids))
                        .to_owned();

                    let sql = <$db_type>::build_select(stmt);
                    let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                    items.reserve(rows.len());
                    for row in rows {
                        items.push(UnifiedOrderItem {
                            id: <$db_type>::uuid(&row, "id")?,
                            tenant_id: <$db_type>::uuid(&row, "tenant_id")?,
                            order_id: <$db_type>::uuid(&row, "order_id")?,
                            platform: row.try_get("platform")?,
                            external_line_id: row.try_get("external_line_id")?,
                            product_external_id: row.try_get("product_external_id")?,
                            sku: row.try_get("sku")?,
                            quantity: <$db_type>::opt_decimal(&row, "quantity")?,
                            price: <$db_type>::opt_decimal(&row, "price")?,
                            total: <$db_type>::opt_decimal(&row, "total")?,
                            discount: <$db_type>::opt_decimal(&row, "discount")?,
                            tax: <$db_type>::opt_decimal(&row, "tax")?,
                        });
                    }
                }

                // Latest product facts per external id; rows arrive
                // newest-first, first one wins.
                let sql = {
                    let mut stmt = Query::select();
                    stmt.columns([
                        UnifiedProducts::ExternalProductId,
                        UnifiedProducts::Sku,
                        UnifiedProducts::Price,
                        UnifiedProducts::Cost,
                        UnifiedProducts::IsSuppressed,
                        UnifiedProducts::BuyBoxPercent,
                        UnifiedProducts::ConversionRate,
                    ])
                    .from(UnifiedProducts::Table)
                    .and_where(Expr::col(UnifiedProducts::TenantId).eq(tenant.as_str()))
                    .order_by(UnifiedProducts::CreatedAt, Order::Desc);
                    if let Some(platform) = partition.platform.as_deref() {
                        stmt.and_where(Expr::col(UnifiedProducts::Platform).eq(platform));
                    }
                    <$db_type>::build_select(stmt)
                };
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                let mut products: HashMap<String, ProductFacts> = HashMap::new();
                for row in rows {
                    let external_id: Option<String> = row.try_get("external_product_id")?;
                    let Some(external_id) = external_id else {
                        continue;
                    };
                    if products.contains_key(&external_id) {
                        continue;
                    }
                    let facts = ProductFacts {
                        product_external_id: external_id.clone(),
                        sku: row.try_get("sku")?,
                        price: <$db_type>::opt_decimal(&row, "price")?,
                        cost: <$db_type>::opt_decimal(&row, "cost")?,
                        is_suppressed: row
                            .try_get::<Option<bool>, _>("is_suppressed")?
                            .unwrap_or(false),
                        buy_box_percent: <$db_type>::opt_decimal(&row, "buy_box_percent")?,
                        conversion_rate: <$db_type>::opt_decimal(&row, "conversion_rate")?,
                    };
                    products.insert(external_id, facts);
                }

                let sql = {
                    let mut stmt = Query::select();
                    stmt.columns([
                        UnifiedInventory::Platform,
                        UnifiedInventory::ProductExternalId,
                        UnifiedInventory::Sku,
                        UnifiedInventory::Location,
                        UnifiedInventory::OnHand,
                        UnifiedInventory::UpdatedAt,
                    ])
                    .from(UnifiedInventory::Table)
                    .and_where(Expr::col(UnifiedInventory::TenantId).eq(tenant.as_str()));
                    if let Some(platform) = partition.platform.as_deref() {
                        stmt.and_where(Expr::col(UnifiedInventory::Platform).eq(platform));
                    }
                    <$db_type>::build_select(stmt)
                };
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                let mut levels = Vec::with_capacity(rows.len());
                for row in rows {
                    levels.push(InventoryLevel {
                        platform: row.try_get("platform")?,
                        product_external_id: row.try_get("product_external_id")?,
                        sku: row.try_get("sku")?,
                        location: row.try_get("location")?,
                        on_hand: <$db_type>::opt_decimal(&row, "on_hand")?
                            .unwrap_or(Decimal::ZERO),
                        updated_at: <$db_type>::timestamp(&row, "updated_at")?,
                    });
                }

                let inventory_value = inventory_value(levels, &products);

                Ok(crate::model::PartitionSnapshot {
                    partition: partition.clone(),
                    orders,
                    items,
                    products,
                    ad_spend: Decimal::ZERO,
                    inventory_value,
                })
            }

            async fn tenant_exists(
                &self,
                tenant_id: uuid::Uuid,
            ) -> crate::interfaces::record_store::Result<bool> {
                use sea_query::{Expr, Query};

                use crate::storage::schema::Tenants;

                let stmt = Query::select()
                    .column(Tenants::Id)
                    .from(Tenants::Table)
                    .and_where(Expr::col(Tenants::Id).eq(tenant_id.to_string()))
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);
                let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

                Ok(row.is_some())
            }

            async fn list_tenants(
                &self,
            ) -> crate::interfaces::record_store::Result<Vec<uuid::Uuid>> {
                use sea_query::{Order, Query};

                use crate::storage::schema::Tenants;

                let stmt = Query::select()
                    .column(Tenants::Id)
                    .from(Tenants::Table)
                    .order_by(Tenants::Id, Order::Asc)
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                let mut tenants = Vec::with_capacity(rows.len());
                for row in rows {
                    tenants.push(<$db_type>::uuid(&row, "id")?);
                }

                Ok(tenants)
            }

            async fn active_platforms(
                &self,
                tenant_id: uuid::Uuid,
                date: chrono::NaiveDate,
            ) -> crate::interfaces::record_store::Result<Vec<String>> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::storage::schema::UnifiedOrders;

                let (day_start, day_end) = day_window(date);

                let stmt = Query::select()
                    .distinct()
                    .column(UnifiedOrders::Platform)
                    .from(UnifiedOrders::Table)
                    .and_where(Expr::col(UnifiedOrders::TenantId).eq(tenant_id.to_string()))
                    .and_where(Expr::col(UnifiedOrders::OrderDate).gte(day_start.as_str()))
                    .and_where(Expr::col(UnifiedOrders::OrderDate).lt(day_end.as_str()))
                    .order_by(UnifiedOrders::Platform, Order::Asc)
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                let platforms = rows
                    .iter()
                    .map(|row| row.try_get("platform"))
                    .collect::<Result<Vec<String>, _>>()?;

                Ok(platforms)
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_record_store!(super::postgres::Postgres, "postgres");
impl_record_store!(super::sqlite::Sqlite, "sqlite");

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(id: &str, sku: &str, cost: &str) -> ProductFacts {
        ProductFacts {
            product_external_id: id.to_string(),
            sku: Some(sku.to_string()),
            cost: Some(cost.parse().unwrap()),
            ..Default::default()
        }
    }

    fn level(product: Option<&str>, sku: Option<&str>, location: &str, on_hand: &str, age_secs: i64) -> InventoryLevel {
        InventoryLevel {
            platform: Some("shopify".to_string()),
            product_external_id: product.map(str::to_string),
            sku: sku.map(str::to_string),
            location: Some(location.to_string()),
            on_hand: on_hand.parse().unwrap(),
            updated_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_inventory_value_uses_latest_snapshot() {
        let mut products = HashMap::new();
        products.insert("p1".to_string(), facts("p1", "sku-1", "2.00"));

        // Two snapshots for the same product/location; only the newer counts.
        let levels = vec![
            level(Some("p1"), Some("sku-1"), "east", "100", 3600),
            level(Some("p1"), Some("sku-1"), "east", "40", 60),
        ];

        assert_eq!(
            inventory_value(levels, &products),
            "80.00".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_inventory_value_resolves_cost_by_sku() {
        let mut products = HashMap::new();
        products.insert("p1".to_string(), facts("p1", "sku-1", "3.00"));

        let levels = vec![level(None, Some("sku-1"), "west", "10", 0)];

        assert_eq!(
            inventory_value(levels, &products),
            "30.00".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_inventory_value_skips_unknown_cost() {
        let products = HashMap::new();
        let levels = vec![level(Some("p9"), None, "east", "500", 0)];

        assert_eq!(inventory_value(levels, &products), Decimal::ZERO);
    }

    #[test]
    fn test_day_window_bounds() {
        let (start, end) = day_window(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(start.starts_with("2024-03-01T00:00:00"));
        assert!(end.starts_with("2024-03-02T00:00:00"));
    }
}
