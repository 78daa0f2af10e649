//! Engine error taxonomy.
//!
//! Classification drives the scheduler's behavior: transient and timeout
//! failures re-enter the retry path, missing references drop the partition,
//! fatal configuration errors halt the cycle loop entirely. Data-quality
//! issues are not errors (see [`crate::model::QualityFlag`]): they annotate
//! a committed row, never block it.

use std::time::Duration;

use uuid::Uuid;

use crate::interfaces::StorageError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors from partition recomputation and cycle processing.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Storage hiccup; retry with backoff.
    #[error("Transient storage failure: {0}")]
    Transient(#[from] StorageError),

    /// The tenant was deleted while the partition was in flight. The
    /// cascade already removed its rows; drop the partition, do not retry.
    #[error("Tenant {tenant_id} no longer exists")]
    MissingReference { tenant_id: Uuid },

    /// Partition recomputation exceeded its time budget; treated as
    /// transient for retry purposes.
    #[error("Partition recomputation exceeded {budget:?}")]
    Timeout { budget: Duration },

    /// Unrecoverable configuration problem; halts the scheduler.
    #[error("Fatal configuration error: {0}")]
    FatalConfig(String),
}

impl EngineError {
    /// Whether the scheduler should re-mark the partition and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient(_) | EngineError::Timeout { .. })
    }
}
