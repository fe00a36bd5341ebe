//! Retry spacing for failed records.

use std::time::Duration;

use crate::error::{EnrichmentError, Result};

/// Exponential backoff: `min(base * factor^(n-1), cap)` for the n-th
/// consecutive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            factor: 2,
            cap: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, factor: u32, cap: Duration) -> Self {
        Self { base, factor, cap }
    }

    /// Delay before the next attempt after `failure_count` consecutive
    /// failures. A count of zero is treated as the first failure.
    pub fn delay(&self, failure_count: u32) -> Duration {
        let exponent = failure_count.saturating_sub(1);
        self.factor
            .checked_pow(exponent)
            .and_then(|multiplier| self.base.checked_mul(multiplier))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Like [`delay`](Self::delay), but never shorter than a provider's
    /// `Retry-After` hint. Still capped.
    pub fn delay_with_retry_after(&self, failure_count: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.delay(failure_count);
        match retry_after {
            Some(hint) => delay.max(hint).min(self.cap),
            None => delay,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base.is_zero() {
            return Err(EnrichmentError::Config("backoff base must be positive".into()));
        }
        if self.factor == 0 {
            return Err(EnrichmentError::Config("backoff factor must be at least 1".into()));
        }
        if self.cap < self.base {
            return Err(EnrichmentError::Config(format!(
                "backoff cap ({:?}) must be at least the base ({:?})",
                self.cap, self.base
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_base() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(30));
        assert_eq!(policy.delay(2), Duration::from_secs(60));
        assert_eq!(policy.delay(3), Duration::from_secs(120));
        assert_eq!(policy.delay(0), policy.delay(1));
    }

    #[test]
    fn never_decreases_and_never_exceeds_cap() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for n in 1..=200 {
            let delay = policy.delay(n);
            assert!(delay >= previous, "delay({n}) went down");
            assert!(delay <= policy.cap, "delay({n}) above cap");
            previous = delay;
        }
        assert_eq!(policy.delay(200), policy.cap);
    }

    #[test]
    fn retry_after_raises_but_stays_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_with_retry_after(1, Some(Duration::from_secs(600))),
            Duration::from_secs(600)
        );
        assert_eq!(
            policy.delay_with_retry_after(3, Some(Duration::from_secs(5))),
            Duration::from_secs(120)
        );
        assert_eq!(
            policy.delay_with_retry_after(1, Some(Duration::from_secs(7 * 24 * 60 * 60))),
            policy.cap
        );
    }

    #[test]
    fn rejects_degenerate_policies() {
        assert!(BackoffPolicy::new(Duration::ZERO, 2, Duration::from_secs(60)).validate().is_err());
        assert!(BackoffPolicy::new(Duration::from_secs(5), 0, Duration::from_secs(60)).validate().is_err());
        assert!(BackoffPolicy::new(Duration::from_secs(90), 2, Duration::from_secs(60)).validate().is_err());
        BackoffPolicy::default().validate().unwrap();
    }
}
