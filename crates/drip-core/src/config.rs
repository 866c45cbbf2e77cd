//! Queue configuration.
//!
//! Every knob is an independently named field. Durations travel as integer
//! milliseconds (`*_ms` keys), and any missing key falls back to its default,
//! so `{"min_delay_ms": 500}` is a complete configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Lower bound of the spacing between two dispatch starts.
    #[serde(rename = "min_delay_ms", default = "default_min_delay", with = "duration_ms")]
    pub min_delay: Duration,

    /// Upper bound of the spacing; also caps retry backoff.
    #[serde(rename = "max_delay_ms", default = "default_max_delay", with = "duration_ms")]
    pub max_delay: Duration,

    /// Maximum number of tasks in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per task, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(
        rename = "retry_base_delay_ms",
        default = "default_retry_base_delay",
        with = "duration_ms"
    )]
    pub retry_base_delay: Duration,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Weighted consecutive failures that abort the run.
    #[serde(default = "default_abort_threshold")]
    pub abort_threshold: u32,

    /// How much a fatal failure counts toward `abort_threshold`.
    #[serde(default = "default_fatal_weight")]
    pub fatal_weight: u32,
}

fn default_min_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(1600)
}

fn default_concurrency() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_abort_threshold() -> u32 {
    5
}

fn default_fatal_weight() -> u32 {
    2
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_base_delay: default_retry_base_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            abort_threshold: default_abort_threshold(),
            fatal_weight: default_fatal_weight(),
        }
    }
}

impl QueueConfig {
    /// Pacing bounds in milliseconds, everything else at its default.
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            min_delay: Duration::from_millis(min_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay > self.max_delay {
            return Err(ConfigError::invalid(
                "min_delay_ms",
                format!(
                    "{}ms exceeds max_delay_ms {}ms",
                    self.min_delay.as_millis(),
                    self.max_delay.as_millis()
                ),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.abort_threshold == 0 {
            return Err(ConfigError::invalid("abort_threshold", "must be at least 1"));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "backoff_multiplier",
                format!("must be a finite number >= 1.0, got {}", self.backoff_multiplier),
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
