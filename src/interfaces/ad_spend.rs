//! External ad-spend supply.
//!
//! `ad_spend` on a daily rollup is an external fact (ad-platform connector
//! territory), never derived from orders. The engine only passes it through.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::record_store::Result;
use crate::model::PartitionKey;

/// Supplies the ad spend attributed to one partition.
#[async_trait]
pub trait AdSpendSource: Send + Sync {
    async fn ad_spend(&self, partition: &PartitionKey) -> Result<Decimal>;
}

/// Ad-spend source for deployments without an ad-platform connector.
///
/// Always reports zero, which leaves `net_profit = gross_profit - fees`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAdSpendSource;

#[async_trait]
impl AdSpendSource for NullAdSpendSource {
    async fn ad_spend(&self, _partition: &PartitionKey) -> Result<Decimal> {
        Ok(Decimal::ZERO)
    }
}
