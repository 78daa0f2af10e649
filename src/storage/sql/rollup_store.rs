//! Unified SQL RollupStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend. Every
//! write is a single INSERT .. ON CONFLICT DO UPDATE keyed by the table's
//! unique index, so concurrent writers for the same key serialize at the
//! statement and `created_at` survives from the first insert.

use std::marker::PhantomData;

use super::SqlDatabase;

/// SQL-based implementation of RollupStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlRollupStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlRollupStore<DB> {
    /// Create a new SQL rollup store with the given pool.
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

/// Macro to implement RollupStore for a specific SQL backend.
macro_rules! impl_rollup_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::interfaces::RollupStore for SqlRollupStore<$db_type> {
            async fn upsert_daily(
                &self,
                rollup: &crate::model::DailyRollup,
            ) -> crate::interfaces::record_store::Result<()> {
                use sea_query::{OnConflict, Query};

                use crate::storage::schema::{UnifiedMetricsDaily, PLATFORM_ALL};

                let now = chrono::Utc::now().to_rfc3339();
                let platform = rollup
                    .partition
                    .platform
                    .clone()
                    .unwrap_or_else(|| PLATFORM_ALL.to_string());

                let stmt = Query::insert()
                    .into_table(UnifiedMetricsDaily::Table)
                    .columns([
                        UnifiedMetricsDaily::Id,
                        UnifiedMetricsDaily::TenantId,
                        UnifiedMetricsDaily::Date,
                        UnifiedMetricsDaily::Platform,
                        UnifiedMetricsDaily::TotalOrders,
                        UnifiedMetricsDaily::TotalSales,
                        UnifiedMetricsDaily::NetSales,
                        UnifiedMetricsDaily::Discounts,
                        UnifiedMetricsDaily::Taxes,
                        UnifiedMetricsDaily::Refunds,
                        UnifiedMetricsDaily::UnitsSold,
                        UnifiedMetricsDaily::AdSpend,
                        UnifiedMetricsDaily::InventoryValue,
                        UnifiedMetricsDaily::GrossProfit,
                        UnifiedMetricsDaily::NetProfit,
                        UnifiedMetricsDaily::Aov,
                        UnifiedMetricsDaily::FulfillmentRate,
                        UnifiedMetricsDaily::RefundRate,
                        UnifiedMetricsDaily::CreatedAt,
                        UnifiedMetricsDaily::UpdatedAt,
                    ])
                    .values_panic([
                        uuid::Uuid::new_v4().to_string().into(),
                        rollup.partition.tenant_id.to_string().into(),
                        rollup.partition.date.to_string().into(),
                        platform.into(),
                        rollup.total_orders.into(),
                        rollup.total_sales.to_string().into(),
                        rollup.net_sales.to_string().into(),
                        rollup.discounts.to_string().into(),
                        rollup.taxes.to_string().into(),
                        rollup.refunds.to_string().into(),
                        rollup.units_sold.into(),
                        rollup.ad_spend.to_string().into(),
                        rollup.inventory_value.to_string().into(),
                        rollup.gross_profit.to_string().into(),
                        rollup.net_profit.to_string().into(),
                        rollup.aov.to_string().into(),
                        rollup.fulfillment_rate.to_string().into(),
                        rollup.refund_rate.to_string().into(),
                        now.clone().into(),
                        now.into(),
                    ])
                    .on_conflict(
                        OnConflict::columns([
                            UnifiedMetricsDaily::TenantId,
                            UnifiedMetricsDaily::Date,
                            UnifiedMetricsDaily::Platform,
                        ])
                        .update_columns([
                            UnifiedMetricsDaily::TotalOrders,
                            UnifiedMetricsDaily::TotalSales,
                            UnifiedMetricsDaily::NetSales,
                            UnifiedMetricsDaily::Discounts,
                            UnifiedMetricsDaily::Taxes,
                            UnifiedMetricsDaily::Refunds,
                            UnifiedMetricsDaily::UnitsSold,
                            UnifiedMetricsDaily::AdSpend,
                            UnifiedMetricsDaily::InventoryValue,
                            UnifiedMetricsDaily::GrossProfit,
                            UnifiedMetricsDaily::NetProfit,
                            UnifiedMetricsDaily::Aov,
                            UnifiedMetricsDaily::FulfillmentRate,
                            UnifiedMetricsDaily::RefundRate,
                            UnifiedMetricsDaily::UpdatedAt,
                        ])
                        .to_owned(),
                    )
                    .to_owned();

                let sql = <$db_type>::build_insert(stmt);
                sqlx::query(&sql).execute(&self.pool).await?;

                Ok(())
            }

            async fn upsert_product(
                &self,
                rollup: &crate::model::ProductRollup,
            ) -> crate::interfaces::record_store::Result<()> {
                use sea_query::{OnConflict, Query};

                use crate::storage::schema::ProductMetrics;

                let now = chrono::Utc::now().to_rfc3339();

                let stmt = Query::insert()
                    .into_table(ProductMetrics::Table)
                    .columns([
                        ProductMetrics::Id,
                        ProductMetrics::TenantId,
                        ProductMetrics::ProductExternalId,
                        ProductMetrics::Sku,
                        ProductMetrics::Date,
                        ProductMetrics::Revenue,
                        ProductMetrics::UnitsSold,
                        ProductMetrics::ConversionRate,
                        ProductMetrics::BuyBoxPercent,
                        ProductMetrics::CreatedAt,
                        ProductMetrics::UpdatedAt,
                    ])
                    .values_panic([
                        uuid::Uuid::new_v4().to_string().into(),
                        rollup.tenant_id.to_string().into(),
                        rollup.product_external_id.clone().into(),
                        rollup.sku.clone().into(),
                        rollup.date.to_string().into(),
                        rollup.revenue.to_string().into(),
                        rollup.units_sold.into(),
                        rollup.conversion_rate.to_string().into(),
                        rollup.buy_box_percent.to_string().into(),
                        now.clone().into(),
                        now.into(),
                    ])
                    .on_conflict(
                        OnConflict::columns([
                            ProductMetrics::TenantId,
                            ProductMetrics::ProductExternalId,
                            ProductMetrics::Date,
                        ])
                        .update_columns([
                            ProductMetrics::Sku,
                            ProductMetrics::Revenue,
                            ProductMetrics::UnitsSold,
                            ProductMetrics::ConversionRate,
                            ProductMetrics::BuyBoxPercent,
                            ProductMetrics::UpdatedAt,
                        ])
                        .to_owned(),
                    )
                    .to_owned();

                let sql = <$db_type>::build_insert(stmt);
                sqlx::query(&sql).execute(&self.pool).await?;

                Ok(())
            }

            async fn fetch_daily(
                &self,
                partition: &crate::model::PartitionKey,
            ) -> crate::interfaces::record_store::Result<
                Option<crate::interfaces::StoredDailyRollup>,
            > {
                use sea_query::{Expr, Query};
                use sqlx::Row;

                use crate::storage::schema::{UnifiedMetricsDaily, PLATFORM_ALL};

                let platform = partition.platform.as_deref().unwrap_or(PLATFORM_ALL);

                let stmt = Query::select()
                    .columns([
                        UnifiedMetricsDaily::TotalOrders,
                        UnifiedMetricsDaily::TotalSales,
                        UnifiedMetricsDaily::NetSales,
                        UnifiedMetricsDaily::Discounts,
                        UnifiedMetricsDaily::Taxes,
                        UnifiedMetricsDaily::Refunds,
                        UnifiedMetricsDaily::UnitsSold,
                        UnifiedMetricsDaily::AdSpend,
                        UnifiedMetricsDaily::InventoryValue,
                        UnifiedMetricsDaily::GrossProfit,
                        UnifiedMetricsDaily::NetProfit,
                        UnifiedMetricsDaily::Aov,
                        UnifiedMetricsDaily::FulfillmentRate,
                        UnifiedMetricsDaily::RefundRate,
                        UnifiedMetricsDaily::CreatedAt,
                        UnifiedMetricsDaily::UpdatedAt,
                    ])
                    .from(UnifiedMetricsDaily::Table)
                    .and_where(
                        Expr::col(UnifiedMetricsDaily::TenantId)
                            .eq(partition.tenant_id.to_string()),
                    )
                    .and_where(
                        Expr::col(UnifiedMetricsDaily::Date).eq(partition.date.to_string()),
                    )
                    .and_where(Expr::col(UnifiedMetricsDaily::Platform).eq(platform))
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);
                let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

                let Some(row) = row else {
                    return Ok(None);
                };

                let rollup = crate::model::DailyRollup {
                    partition: partition.clone(),
                    total_orders: row.try_get("total_orders")?,
                    total_sales: <$db_type>::decimal(&row, "total_sales")?,
                    net_sales: <$db_type>::decimal(&row, "net_sales")?,
                    discounts: <$db_type>::decimal(&row, "discounts")?,
                    taxes: <$db_type>::decimal(&row, "taxes")?,
                    refunds: <$db_type>::decimal(&row, "refunds")?,
                    units_sold: row.try_get("units_sold")?,
                    ad_spend: <$db_type>::decimal(&row, "ad_spend")?,
                    inventory_value: <$db_type>::decimal(&row, "inventory_value")?,
                    gross_profit: <$db_type>::decimal(&row, "gross_profit")?,
                    net_profit: <$db_type>::decimal(&row, "net_profit")?,
                    aov: <$db_type>::decimal(&row, "aov")?,
                    fulfillment_rate: <$db_type>::decimal(&row, "fulfillment_rate")?,
                    refund_rate: <$db_type>::decimal(&row, "refund_rate")?,
                    flags: Vec::new(),
                };

                Ok(Some(crate::interfaces::StoredDailyRollup {
                    rollup,
                    created_at: <$db_type>::timestamp(&row, "created_at")?,
                    updated_at: <$db_type>::timestamp(&row, "updated_at")?,
                }))
            }

            async fn fetch_products_for_day(
                &self,
                tenant_id: uuid::Uuid,
                date: chrono::NaiveDate,
            ) -> crate::interfaces::record_store::Result<Vec<crate::model::ProductRollup>> {
                use sea_query::{Expr, Order, Query};
                use sqlx::Row;

                use crate::storage::schema::ProductMetrics;

                let stmt = Query::select()
                    .columns([
                        ProductMetrics::ProductExternalId,
                        ProductMetrics::Sku,
                        ProductMetrics::Revenue,
                        ProductMetrics::UnitsSold,
                        ProductMetrics::ConversionRate,
                        ProductMetrics::BuyBoxPercent,
                    ])
                    .from(ProductMetrics::Table)
                    .and_where(Expr::col(ProductMetrics::TenantId).eq(tenant_id.to_string()))
                    .and_where(Expr::col(ProductMetrics::Date).eq(date.to_string()))
                    .order_by(ProductMetrics::ProductExternalId, Order::Asc)
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

                let mut rollups = Vec::with_capacity(rows.len());
                for row in rows {
                    rollups.push(crate::model::ProductRollup {
                        tenant_id,
                        product_external_id: row.try_get("product_external_id")?,
                        sku: row.try_get("sku")?,
                        date,
                        revenue: <$db_type>::decimal(&row, "revenue")?,
                        units_sold: row.try_get("units_sold")?,
                        conversion_rate: <$db_type>::decimal(&row, "conversion_rate")?,
                        buy_box_percent: <$db_type>::decimal(&row, "buy_box_percent")?,
                    });
                }

                Ok(rollups)
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_rollup_store!(super::postgres::Postgres, "postgres");
impl_rollup_store!(super::sqlite::Sqlite, "sqlite");
