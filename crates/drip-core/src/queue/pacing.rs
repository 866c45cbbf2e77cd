//! Pacing gate: random minimum spacing between dispatch starts.
//!
//! Before each dispatch (retries included) the gate draws a spacing from
//! `[min_delay, max_delay]` and waits until that much time has passed since
//! the previous dispatch *started*. The first dispatch passes immediately.

use std::time::Duration;

use tokio::time::Instant;

use crate::ports::{Clock, JitterSource};

#[derive(Debug, Clone)]
pub struct PacingGate {
    min_delay: Duration,
    max_delay: Duration,
    last_start: Option<Instant>,
}

impl PacingGate {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            last_start: None,
        }
    }

    /// Wait for the gate, then mark now as the latest dispatch start.
    /// Returns how long this call waited.
    pub async fn pass(&mut self, clock: &dyn Clock, jitter: &dyn JitterSource) -> Duration {
        let wait = match self.last_start {
            None => Duration::ZERO,
            Some(last) => {
                let spacing = jitter.pick(self.min_delay, self.max_delay);
                (last + spacing).saturating_duration_since(clock.now())
            }
        };
        if !wait.is_zero() {
            clock.sleep(wait).await;
        }
        self.last_start = Some(clock.now());
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedJitter, ManualClock};

    #[tokio::test]
    async fn first_pass_is_immediate() {
        let clock = ManualClock::new();
        let jitter = FixedJitter::constant(Duration::from_millis(700));
        let mut gate = PacingGate::new(Duration::from_millis(200), Duration::from_millis(1600));

        assert_eq!(gate.pass(&clock, &jitter).await, Duration::ZERO);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn spacing_is_measured_from_previous_start() {
        let clock = ManualClock::new();
        let jitter = FixedJitter::constant(Duration::from_millis(700));
        let mut gate = PacingGate::new(Duration::from_millis(200), Duration::from_millis(1600));

        gate.pass(&clock, &jitter).await;
        // the task itself took 300ms
        clock.advance(Duration::from_millis(300));
        let waited = gate.pass(&clock, &jitter).await;

        assert_eq!(waited, Duration::from_millis(400));
        assert_eq!(clock.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test]
    async fn slow_tasks_do_not_wait_again() {
        let clock = ManualClock::new();
        let jitter = FixedJitter::constant(Duration::from_millis(200));
        let mut gate = PacingGate::new(Duration::from_millis(200), Duration::from_millis(200));

        gate.pass(&clock, &jitter).await;
        clock.advance(Duration::from_secs(2));
        assert_eq!(gate.pass(&clock, &jitter).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn consecutive_starts_stay_within_bounds() {
        let clock = ManualClock::new();
        let jitter = crate::ports::SeededJitter::new(7);
        let min = Duration::from_millis(200);
        let max = Duration::from_millis(1600);
        let mut gate = PacingGate::new(min, max);

        let mut starts = Vec::new();
        for _ in 0..20 {
            gate.pass(&clock, &jitter).await;
            starts.push(clock.now());
        }
        for pair in starts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= min && gap <= max, "gap {gap:?} out of bounds");
        }
    }
}
