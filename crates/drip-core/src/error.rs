use thiserror::Error;

use crate::queue::Phase;

/// Errors surfaced synchronously by the queue facade.
///
/// Task failures never show up here; they are recorded in the report.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("cannot {operation} while the queue is {phase}; call clear() first")]
    InvalidState {
        operation: &'static str,
        phase: Phase,
    },

    #[error("start() must be called from within a tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
