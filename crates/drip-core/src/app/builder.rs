//! QueueBuilder - assembling a queue from config and ports.
//!
//! `build()` validates the configuration up front, so a bad setting fails
//! at construction instead of surfacing mid-run.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::config::QueueConfig;
use crate::error::ConfigError;
use crate::ports::{Clock, JitterSource, SystemClock, ThreadRngJitter};
use crate::queue::TaskQueue;

/// Builder for [`TaskQueue`].
///
/// # Example
/// ```ignore
/// let queue = QueueBuilder::<String>::new()
///     .pacing(Duration::from_millis(200), Duration::from_millis(1600))
///     .concurrency(2)
///     .jitter(SeededJitter::new(7))
///     .build()?;
/// ```
pub struct QueueBuilder<T> {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
    _output: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> QueueBuilder<T> {
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            clock: Arc::new(SystemClock),
            jitter: Arc::new(ThreadRngJitter),
            _output: PhantomData,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pacing(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.config.min_delay = min_delay;
        self.config.max_delay = max_delay;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn retry_backoff(mut self, base_delay: Duration, multiplier: f64) -> Self {
        self.config.retry_base_delay = base_delay;
        self.config.backoff_multiplier = multiplier;
        self
    }

    pub fn abort_threshold(mut self, threshold: u32) -> Self {
        self.config.abort_threshold = threshold;
        self
    }

    pub fn fatal_weight(mut self, weight: u32) -> Self {
        self.config.fatal_weight = weight;
        self
    }

    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn jitter(mut self, jitter: impl JitterSource) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    /// Validate the configuration and construct the queue.
    pub fn build(self) -> Result<TaskQueue<T>, ConfigError> {
        self.config.validate()?;
        Ok(TaskQueue::from_parts(self.config, self.clock, self.jitter))
    }
}

impl<T: Send + 'static> Default for QueueBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
