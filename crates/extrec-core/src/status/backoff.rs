//! Exponential backoff for retry scheduling.

use std::time::Duration;

/// Exponential backoff with a cap: `base * 2^retry_count`.
///
/// A fresh error is scheduled after `base_delay` (retry count 0); each
/// recorded failure doubles the delay up to `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl BackoffPolicy {
    pub fn from_secs(base_delay_secs: u64, max_delay_secs: u64) -> Self {
        Self {
            base_delay: Duration::from_secs(base_delay_secs),
            max_delay: Duration::from_secs(max_delay_secs),
        }
    }

    /// Delay before the next attempt for an error at the given retry count.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        // Shift is capped so the multiplier cannot overflow; the delay is
        // capped by max_delay long before that matters.
        let raw = self.base_delay.saturating_mul(1 << retry_count.min(16));
        raw.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_is_base() {
        let p = BackoffPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(60));
    }

    #[test]
    fn delay_doubles_per_retry() {
        let p = BackoffPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_secs(120));
        assert_eq!(p.delay_for(2), Duration::from_secs(240));
        assert_eq!(p.delay_for(3), Duration::from_secs(480));
    }

    #[test]
    fn delay_is_capped() {
        let p = BackoffPolicy::default();
        assert_eq!(p.delay_for(30), p.max_delay);

        let tight = BackoffPolicy::from_secs(60, 100);
        assert_eq!(tight.delay_for(0), Duration::from_secs(60));
        assert_eq!(tight.delay_for(1), Duration::from_secs(100));
        assert_eq!(tight.delay_for(5), Duration::from_secs(100));
    }
}
