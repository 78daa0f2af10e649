//! Abstract interfaces for the rollup engine.
//!
//! These traits define the contracts for:
//! - Unified record reads (the ingestion-owned tables, read-only here)
//! - Rollup persistence (the only tables this crate mutates)
//! - External ad-spend supply (pass-through input, never derived)

pub mod ad_spend;
pub mod record_store;
pub mod rollup_store;

pub use ad_spend::{AdSpendSource, NullAdSpendSource};
pub use record_store::{RecordStore, StorageError};
pub use rollup_store::{RollupStore, StoredDailyRollup};
