//! Consecutive-failure circuit breaker.
//!
//! Each terminal failure adds its weight (1, or `fatal_weight` for fatal
//! errors); any success resets the count. Once the count reaches the
//! threshold the breaker trips and stays tripped until `reset`.

use crate::domain::TaskError;

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    fatal_weight: u32,
    consecutive: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, fatal_weight: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            fatal_weight: fatal_weight.max(1),
            consecutive: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Returns true when this failure trips the breaker.
    pub fn record_failure(&mut self, error: &TaskError) -> bool {
        let weight = if error.is_fatal() { self.fatal_weight } else { 1 };
        self.consecutive = self.consecutive.saturating_add(weight);
        self.is_tripped()
    }

    pub fn is_tripped(&self) -> bool {
        self.consecutive >= self.threshold
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn trips_after_threshold_transient_failures() {
        let mut b = CircuitBreaker::new(3, 2);
        let err = TaskError::transient("timeout");
        assert!(!b.record_failure(&err));
        assert!(!b.record_failure(&err));
        assert!(b.record_failure(&err));
    }

    #[test]
    fn success_resets_the_count() {
        let mut b = CircuitBreaker::new(2, 2);
        b.record_failure(&TaskError::transient("x"));
        b.record_success();
        assert_eq!(b.consecutive(), 0);
        assert!(!b.record_failure(&TaskError::transient("x")));
    }

    #[rstest]
    #[case::fatal_counts_double(5, 2, 3)]
    #[case::single_fatal_trips(2, 2, 1)]
    #[case::weight_one_is_plain(3, 1, 3)]
    fn fatal_failures_needed_to_trip(
        #[case] threshold: u32,
        #[case] weight: u32,
        #[case] expected: u32,
    ) {
        let mut b = CircuitBreaker::new(threshold, weight);
        let err = TaskError::fatal("401");
        let mut n = 0;
        while !b.is_tripped() {
            b.record_failure(&err);
            n += 1;
        }
        assert_eq!(n, expected);
    }
}
