//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query
//! building, plus per-backend bootstrap DDL. SQLite stores UUIDs, dates,
//! timestamps, and decimals at TEXT affinity (parsed at the row boundary);
//! PostgreSQL uses native UUID/DATE/TIMESTAMPTZ/NUMERIC columns.
//!
//! The combined ("all platforms") rollup row is stored with the sentinel
//! [`PLATFORM_ALL`] rather than NULL: both backends treat NULLs as distinct
//! in unique indexes, which would break the upsert key.

use sea_query::Iden;

/// Stored platform value for the combined (all-platforms) rollup row.
pub const PLATFORM_ALL: &str = "all";

/// Tenants table schema.
#[derive(Iden)]
pub enum Tenants {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "name"]
    Name,
    #[iden = "api_key"]
    ApiKey,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Unified orders table schema.
#[derive(Iden)]
pub enum UnifiedOrders {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "tenant_id"]
    TenantId,
    #[iden = "platform"]
    Platform,
    #[iden = "external_order_id"]
    ExternalOrderId,
    #[iden = "customer_external_id"]
    CustomerExternalId,
    #[iden = "order_number"]
    OrderNumber,
    #[iden = "order_date"]
    OrderDate,
    #[iden = "financial_status"]
    FinancialStatus,
    #[iden = "fulfillment_status"]
    FulfillmentStatus,
    #[iden = "channel"]
    Channel,
    #[iden = "gross_sales"]
    GrossSales,
    #[iden = "net_sales"]
    NetSales,
    #[iden = "total_tax"]
    TotalTax,
    #[iden = "discount_amount"]
    DiscountAmount,
    #[iden = "shipping_amount"]
    ShippingAmount,
    #[iden = "refund_amount"]
    RefundAmount,
    #[iden = "total_fees"]
    TotalFees,
    #[iden = "net_payout"]
    NetPayout,
    #[iden = "currency"]
    Currency,
    #[iden = "created_at"]
    CreatedAt,
}

/// Unified order items table schema.
#[derive(Iden)]
pub enum UnifiedOrderItems {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "tenant_id"]
    TenantId,
    #[iden = "order_id"]
    OrderId,
    #[iden = "platform"]
    Platform,
    #[iden = "external_line_id"]
    ExternalLineId,
    #[iden = "product_external_id"]
    ProductExternalId,
    #[iden = "sku"]
    Sku,
    #[iden = "quantity"]
    Quantity,
    #[iden = "price"]
    Price,
    #[iden = "total"]
    Total,
    #[iden = "discount"]
    Discount,
    #[iden = "tax"]
    Tax,
}

/// Unified products table schema.
#[derive(Iden)]
pub enum UnifiedProducts {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "tenant_id"]
    TenantId,
    #[iden = "platform"]
    Platform,
    #[iden = "external_product_id"]
    ExternalProductId,
    #[iden = "sku"]
    Sku,
    #[iden = "title"]
    Title,
    #[iden = "brand"]
    Brand,
    #[iden = "category"]
    Category,
    #[iden = "price"]
    Price,
    #[iden = "cost"]
    Cost,
    #[iden = "is_suppressed"]
    IsSuppressed,
    #[iden = "buy_box_percent"]
    BuyBoxPercent,
    #[iden = "conversion_rate"]
    ConversionRate,
    #[iden = "created_at"]
    CreatedAt,
}

/// Unified inventory table schema.
#[derive(Iden)]
pub enum UnifiedInventory {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "tenant_id"]
    TenantId,
    #[iden = "platform"]
    Platform,
    #[iden = "product_external_id"]
    ProductExternalId,
    #[iden = "sku"]
    Sku,
    #[iden = "location"]
    Location,
    #[iden = "on_hand"]
    OnHand,
    #[iden = "available"]
    Available,
    #[iden = "reserved"]
    Reserved,
    #[iden = "inbound"]
    Inbound,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Daily metrics rollup table schema.
#[derive(Iden)]
pub enum UnifiedMetricsDaily {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "tenant_id"]
    TenantId,
    #[iden = "date"]
    Date,
    #[iden = "platform"]
    Platform,
    #[iden = "total_orders"]
    TotalOrders,
    #[iden = "total_sales"]
    TotalSales,
    #[iden = "net_sales"]
    NetSales,
    #[iden = "discounts"]
    Discounts,
    #[iden = "taxes"]
    Taxes,
    #[iden = "refunds"]
    Refunds,
    #[iden = "units_sold"]
    UnitsSold,
    #[iden = "ad_spend"]
    AdSpend,
    #[iden = "inventory_value"]
    InventoryValue,
    #[iden = "gross_profit"]
    GrossProfit,
    #[iden = "net_profit"]
    NetProfit,
    #[iden = "aov"]
    Aov,
    #[iden = "fulfillment_rate"]
    FulfillmentRate,
    #[iden = "refund_rate"]
    RefundRate,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Product metrics rollup table schema.
#[derive(Iden)]
pub enum ProductMetrics {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "tenant_id"]
    TenantId,
    #[iden = "product_external_id"]
    ProductExternalId,
    #[iden = "sku"]
    Sku,
    #[iden = "date"]
    Date,
    #[iden = "revenue"]
    Revenue,
    #[iden = "units_sold"]
    UnitsSold,
    #[iden = "conversion_rate"]
    ConversionRate,
    #[iden = "buy_box_percent"]
    BuyBoxPercent,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// SQLite bootstrap DDL.
///
/// UUID/date/timestamp/decimal columns are TEXT so values round-trip
/// without SQLite's NUMERIC-affinity float coercion.
pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    api_key TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS unified_orders (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    platform TEXT NOT NULL,
    external_order_id TEXT NOT NULL,
    customer_external_id TEXT,
    order_number TEXT,
    order_date TEXT,
    financial_status TEXT,
    fulfillment_status TEXT,
    channel TEXT,
    gross_sales TEXT,
    net_sales TEXT,
    total_tax TEXT,
    discount_amount TEXT,
    shipping_amount TEXT,
    refund_amount TEXT,
    total_fees TEXT,
    net_payout TEXT,
    currency TEXT NOT NULL DEFAULT 'USD',
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_orders_tenant_platform_external
    ON unified_orders(tenant_id, platform, external_order_id);
CREATE INDEX IF NOT EXISTS idx_orders_tenant_date
    ON unified_orders(tenant_id, order_date);

CREATE TABLE IF NOT EXISTS unified_order_items (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    order_id TEXT NOT NULL REFERENCES unified_orders(id) ON DELETE CASCADE,
    platform TEXT,
    external_line_id TEXT,
    product_external_id TEXT,
    sku TEXT,
    quantity TEXT,
    price TEXT,
    total TEXT,
    discount TEXT,
    tax TEXT
);

CREATE INDEX IF NOT EXISTS idx_items_order ON unified_order_items(order_id);

CREATE TABLE IF NOT EXISTS unified_products (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    platform TEXT,
    external_product_id TEXT,
    sku TEXT,
    title TEXT,
    brand TEXT,
    category TEXT,
    price TEXT,
    cost TEXT,
    is_suppressed INTEGER NOT NULL DEFAULT 0,
    buy_box_percent TEXT,
    conversion_rate TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_products_tenant ON unified_products(tenant_id, platform);

CREATE TABLE IF NOT EXISTS unified_inventory (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    platform TEXT,
    product_external_id TEXT,
    sku TEXT,
    location TEXT,
    on_hand TEXT,
    available TEXT,
    reserved TEXT,
    inbound TEXT,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_inventory_tenant ON unified_inventory(tenant_id, platform);

CREATE TABLE IF NOT EXISTS unified_metrics_daily (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    platform TEXT NOT NULL,
    total_orders INTEGER NOT NULL DEFAULT 0,
    total_sales TEXT NOT NULL DEFAULT '0',
    net_sales TEXT NOT NULL DEFAULT '0',
    discounts TEXT NOT NULL DEFAULT '0',
    taxes TEXT NOT NULL DEFAULT '0',
    refunds TEXT NOT NULL DEFAULT '0',
    units_sold INTEGER NOT NULL DEFAULT 0,
    ad_spend TEXT NOT NULL DEFAULT '0',
    inventory_value TEXT NOT NULL DEFAULT '0',
    gross_profit TEXT NOT NULL DEFAULT '0',
    net_profit TEXT NOT NULL DEFAULT '0',
    aov TEXT NOT NULL DEFAULT '0',
    fulfillment_rate TEXT NOT NULL DEFAULT '0',
    refund_rate TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_metrics_daily
    ON unified_metrics_daily(tenant_id, date, platform);

CREATE TABLE IF NOT EXISTS product_metrics (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    product_external_id TEXT NOT NULL,
    sku TEXT NOT NULL,
    date TEXT NOT NULL,
    revenue TEXT NOT NULL DEFAULT '0',
    units_sold INTEGER NOT NULL DEFAULT 0,
    conversion_rate TEXT NOT NULL DEFAULT '0',
    buy_box_percent TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_product_metrics
    ON product_metrics(tenant_id, product_external_id, date);
"#;

/// PostgreSQL bootstrap DDL.
pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    api_key VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS unified_orders (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    platform VARCHAR(50) NOT NULL,
    external_order_id VARCHAR(255) NOT NULL,
    customer_external_id VARCHAR(255),
    order_number VARCHAR(255),
    order_date TIMESTAMPTZ,
    financial_status VARCHAR(50),
    fulfillment_status VARCHAR(50),
    channel VARCHAR(100),
    gross_sales NUMERIC(15,2),
    net_sales NUMERIC(15,2),
    total_tax NUMERIC(15,2),
    discount_amount NUMERIC(15,2),
    shipping_amount NUMERIC(15,2),
    refund_amount NUMERIC(15,2),
    total_fees NUMERIC(15,2),
    net_payout NUMERIC(15,2),
    currency VARCHAR(3) NOT NULL DEFAULT 'USD',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_orders_tenant_platform_external
    ON unified_orders(tenant_id, platform, external_order_id);
CREATE INDEX IF NOT EXISTS idx_orders_tenant_date
    ON unified_orders(tenant_id, order_date);

CREATE TABLE IF NOT EXISTS unified_order_items (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    order_id UUID NOT NULL REFERENCES unified_orders(id) ON DELETE CASCADE,
    platform VARCHAR(50),
    external_line_id VARCHAR(255),
    product_external_id VARCHAR(255),
    sku VARCHAR(255),
    quantity NUMERIC(10,2),
    price NUMERIC(15,2),
    total NUMERIC(15,2),
    discount NUMERIC(15,2),
    tax NUMERIC(15,2)
);

CREATE INDEX IF NOT EXISTS idx_items_order ON unified_order_items(order_id);

CREATE TABLE IF NOT EXISTS unified_products (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    platform VARCHAR(50),
    external_product_id VARCHAR(255),
    sku VARCHAR(255),
    title TEXT,
    brand VARCHAR(255),
    category VARCHAR(255),
    price NUMERIC(15,2),
    cost NUMERIC(15,2),
    is_suppressed BOOLEAN NOT NULL DEFAULT FALSE,
    buy_box_percent NUMERIC(5,2),
    conversion_rate NUMERIC(5,4),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_products_tenant ON unified_products(tenant_id, platform);

CREATE TABLE IF NOT EXISTS unified_inventory (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    platform VARCHAR(50),
    product_external_id VARCHAR(255),
    sku VARCHAR(255),
    location VARCHAR(255),
    on_hand NUMERIC(15,2),
    available NUMERIC(15,2),
    reserved NUMERIC(15,2),
    inbound NUMERIC(15,2),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_inventory_tenant ON unified_inventory(tenant_id, platform);

CREATE TABLE IF NOT EXISTS unified_metrics_daily (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    date DATE NOT NULL,
    platform VARCHAR(50) NOT NULL,
    total_orders BIGINT NOT NULL DEFAULT 0,
    total_sales NUMERIC(15,2) NOT NULL DEFAULT 0,
    net_sales NUMERIC(15,2) NOT NULL DEFAULT 0,
    discounts NUMERIC(15,2) NOT NULL DEFAULT 0,
    taxes NUMERIC(15,2) NOT NULL DEFAULT 0,
    refunds NUMERIC(15,2) NOT NULL DEFAULT 0,
    units_sold BIGINT NOT NULL DEFAULT 0,
    ad_spend NUMERIC(15,2) NOT NULL DEFAULT 0,
    inventory_value NUMERIC(15,2) NOT NULL DEFAULT 0,
    gross_profit NUMERIC(15,2) NOT NULL DEFAULT 0,
    net_profit NUMERIC(15,2) NOT NULL DEFAULT 0,
    aov NUMERIC(10,2) NOT NULL DEFAULT 0,
    fulfillment_rate NUMERIC(5,4) NOT NULL DEFAULT 0,
    refund_rate NUMERIC(5,4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_metrics_daily
    ON unified_metrics_daily(tenant_id, date, platform);

CREATE TABLE IF NOT EXISTS product_metrics (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    product_external_id VARCHAR(255) NOT NULL,
    sku VARCHAR(255) NOT NULL,
    date DATE NOT NULL,
    revenue NUMERIC(15,2) NOT NULL DEFAULT 0,
    units_sold BIGINT NOT NULL DEFAULT 0,
    conversion_rate NUMERIC(5,4) NOT NULL DEFAULT 0,
    buy_box_percent NUMERIC(5,4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_product_metrics
    ON product_metrics(tenant_id, product_external_id, date);
"#;
