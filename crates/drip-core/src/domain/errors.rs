//! Task errors and their classification.
//!
//! The queue only needs to know how to react to a failure, not what failed.
//! `ErrorKind` carries that decision:
//! - `Transient`: may succeed on retry (network blip, upstream rate limit).
//! - `Fatal`: retrying is futile (auth failure); counts heavier toward abort.
//! - `NotAttempted`: synthetic, the task was still pending when the queue aborted.
//! - `Cancelled`: synthetic, the task was in flight when the queue aborted.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Fatal,
    NotAttempted,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
            ErrorKind::NotAttempted => "not_attempted",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Error returned by a task operation, or synthesized by the queue.
#[derive(Debug, thiserror::Error)]
#[error("{message} (kind: {kind})")]
pub struct TaskError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    pub fn not_attempted() -> Self {
        Self::new(ErrorKind::NotAttempted, "queue aborted before dispatch")
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "queue aborted while in flight")
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Only transient failures go through the retry/backoff path.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Fatal
    }
}

/// Connection-level I/O failures are worth retrying; anything else is not.
impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            Io::TimedOut
            | Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::BrokenPipe
            | Io::Interrupted
            | Io::WouldBlock => ErrorKind::Transient,
            _ => ErrorKind::Fatal,
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}
