//! Scheduler configuration types.

use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Aggregation scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum partitions recomputed concurrently.
    pub workers: usize,
    /// Seconds between automatic cycles in daemon mode.
    pub check_interval_secs: u64,
    /// Time budget for one partition's recomputation; exceeding it counts
    /// as a transient failure.
    pub partition_timeout_secs: u64,
    /// Consecutive failures before a partition is quarantined.
    pub max_retries: u32,
    /// Base delay before a failed partition's next automatic attempt.
    pub retry_base_ms: u64,
    /// Upper bound on the cross-cycle retry delay.
    pub retry_max_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            check_interval_secs: 60,
            partition_timeout_secs: 30,
            max_retries: 5,
            retry_base_ms: 250,
            retry_max_ms: 60_000,
        }
    }
}

impl SchedulerConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn partition_timeout(&self) -> Duration {
        Duration::from_secs(self.partition_timeout_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.workers == 0 {
            return Err(EngineError::FatalConfig(
                "scheduler.workers must be at least 1".to_string(),
            ));
        }
        if self.partition_timeout_secs == 0 {
            return Err(EngineError::FatalConfig(
                "scheduler.partition_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SchedulerConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::FatalConfig(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = SchedulerConfig {
            partition_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
