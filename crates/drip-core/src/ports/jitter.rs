//! Jitter port - the random source behind pacing delays.
//!
//! The pacing gate never calls a global RNG; it asks a `JitterSource` for a
//! duration in `[min, max]`. Swap the source to get reproducible delays.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait JitterSource: Send + Sync + 'static {
    /// Pick a duration in `[min, max]` (inclusive). `min <= max` is guaranteed
    /// by config validation.
    fn pick(&self, min: Duration, max: Duration) -> Duration;
}

/// Production source: the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn pick(&self, min: Duration, max: Duration) -> Duration {
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

/// Seeded source: the same seed yields the same delay sequence.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn pick(&self, min: Duration, max: Duration) -> Duration {
        if min >= max {
            return min;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(min..=max)
    }
}

/// Scripted source for tests.
///
/// Hands out the scripted delays in order, repeating the last one once the
/// script runs out. Every value is clamped into `[min, max]`.
#[derive(Debug)]
pub struct FixedJitter {
    script: Mutex<VecDeque<Duration>>,
    last: Mutex<Duration>,
}

impl FixedJitter {
    pub fn constant(delay: Duration) -> Self {
        Self::sequence([delay])
    }

    pub fn sequence(delays: impl IntoIterator<Item = Duration>) -> Self {
        let script: VecDeque<Duration> = delays.into_iter().collect();
        let last = script.front().copied().unwrap_or(Duration::ZERO);
        Self {
            script: Mutex::new(script),
            last: Mutex::new(last),
        }
    }
}

impl JitterSource for FixedJitter {
    fn pick(&self, min: Duration, max: Duration) -> Duration {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            *last = next;
        }
        (*last).clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_millis(200);
    const MAX: Duration = Duration::from_millis(1600);

    #[test]
    fn thread_rng_stays_in_bounds() {
        let jitter = ThreadRngJitter;
        for _ in 0..500 {
            let d = jitter.pick(MIN, MAX);
            assert!(d >= MIN && d <= MAX, "{d:?} out of range");
        }
    }

    #[test]
    fn degenerate_range_returns_min() {
        assert_eq!(ThreadRngJitter.pick(MIN, MIN), MIN);
        assert_eq!(SeededJitter::new(1).pick(MAX, MAX), MAX);
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        let xs: Vec<_> = (0..16).map(|_| a.pick(MIN, MAX)).collect();
        let ys: Vec<_> = (0..16).map(|_| b.pick(MIN, MAX)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|d| *d >= MIN && *d <= MAX));
    }

    #[test]
    fn fixed_jitter_follows_script_then_repeats() {
        let jitter = FixedJitter::sequence([
            Duration::from_millis(300),
            Duration::from_millis(900),
        ]);
        assert_eq!(jitter.pick(MIN, MAX), Duration::from_millis(300));
        assert_eq!(jitter.pick(MIN, MAX), Duration::from_millis(900));
        assert_eq!(jitter.pick(MIN, MAX), Duration::from_millis(900));
    }

    #[test]
    fn fixed_jitter_is_clamped() {
        let jitter = FixedJitter::constant(Duration::from_secs(10));
        assert_eq!(jitter.pick(MIN, MAX), MAX);
    }
}
