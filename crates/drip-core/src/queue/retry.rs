//! Retry policy: decides whether a failed attempt runs again, and after how long.

use std::time::Duration;

use crate::config::QueueConfig;
use crate::domain::TaskError;

/// Retry policy for failed attempts.
///
/// Retries happen in place: the task keeps its slot and is not re-queued.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per task, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Cap on any single backoff delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.retry_base_delay,
            multiplier: config.backoff_multiplier,
            max_delay: config.max_delay,
        }
    }

    /// Whether a failure on attempt number `attempts` (1-indexed) gets another try.
    pub fn should_retry(&self, error: &TaskError, attempts: u32) -> bool {
        error.is_retryable() && attempts < self.max_attempts
    }

    /// Backoff after the `attempts`-th failed attempt (1-indexed):
    /// `base_delay * multiplier^(attempts - 1)`, capped at `max_delay`.
    ///
    /// Example with base=500ms, multiplier=2.0, max=1600ms:
    /// - attempt 1: 500ms
    /// - attempt 2: 1000ms
    /// - attempt 3: 1600ms (capped)
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() || secs < 0.0 || secs > self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_millis(1600),
        }
    }

    #[test]
    fn default_policy_follows_config_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_millis(1600));
    }

    #[rstest]
    #[case(0, 500)]
    #[case(1, 500)]
    #[case(2, 1000)]
    #[case(3, 1600)]
    #[case(40, 1600)]
    #[case(u32::MAX, 1600)]
    fn exponential_backoff_is_capped(#[case] attempts: u32, #[case] expected_ms: u64) {
        assert_eq!(policy().next_delay(attempts), Duration::from_millis(expected_ms));
    }

    #[test]
    fn zero_max_delay_means_no_backoff() {
        let p = RetryPolicy {
            max_delay: Duration::ZERO,
            ..policy()
        };
        assert_eq!(p.next_delay(1), Duration::ZERO);
    }

    #[test]
    fn retries_transient_until_attempts_run_out() {
        let p = policy();
        let err = TaskError::transient("503");
        assert!(p.should_retry(&err, 1));
        assert!(p.should_retry(&err, 2));
        assert!(!p.should_retry(&err, 3));
    }

    #[test]
    fn never_retries_fatal() {
        assert!(!policy().should_retry(&TaskError::fatal("401"), 1));
    }
}
