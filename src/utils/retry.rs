//! Retry utilities: backoff builders and delay computation.
//!
//! Uses `backon` for local (in-attempt) retries of transient storage
//! failures. Cross-cycle retry delays for failed partitions are computed
//! with plain bounded doubling, since they span scheduler cycles rather
//! than a single await point.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for rollup upsert statements (transient storage conflicts).
///
/// - Min delay: 50ms
/// - Max delay: 1s
/// - Max attempts: 3
/// - Jitter enabled
pub fn upsert_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(3)
        .with_jitter()
}

/// Backoff for partition snapshot reads.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Max attempts: 3
/// - Jitter enabled
pub fn read_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

/// Delay before a failed partition's next automatic attempt.
///
/// Doubles per consecutive failure, bounded by `max`.
pub fn cycle_retry_delay(consecutive_failures: u32, base: Duration, max: Duration) -> Duration {
    let shift = consecutive_failures.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_retry_delay_doubles() {
        let base = Duration::from_millis(250);
        let max = Duration::from_secs(60);

        assert_eq!(cycle_retry_delay(1, base, max), Duration::from_millis(250));
        assert_eq!(cycle_retry_delay(2, base, max), Duration::from_millis(500));
        assert_eq!(cycle_retry_delay(3, base, max), Duration::from_secs(1));
    }

    #[test]
    fn test_cycle_retry_delay_bounded() {
        let base = Duration::from_millis(250);
        let max = Duration::from_secs(60);

        assert_eq!(cycle_retry_delay(30, base, max), max);
        assert_eq!(cycle_retry_delay(u32::MAX, base, max), max);
    }
}
