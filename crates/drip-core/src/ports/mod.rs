//! Ports - the seams the queue is tested through.
//!
//! Timers and randomness are injected, never reached for globally, so a
//! test can replay an exact dispatch schedule.

pub mod clock;
pub mod jitter;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::jitter::{FixedJitter, JitterSource, SeededJitter, ThreadRngJitter};
