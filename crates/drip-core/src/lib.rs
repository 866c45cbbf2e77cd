//! drip-core
//!
//! A paced, retrying task queue for calling rate-sensitive upstreams.
//!
//! # Modules
//! - **domain**: tasks, task errors, outcomes, progress snapshots
//! - **ports**: injected clock and jitter source
//! - **queue**: the `TaskQueue` facade and its policies (pacing, retry, circuit breaker)
//! - **app**: `QueueBuilder` wiring
//! - **config**: `QueueConfig` with JSON loading and validation
//! - **error**: facade and configuration errors
//! - **observability**: point-in-time counters
//!
//! # Flow
//! 1. `add` appends tasks in FIFO order.
//! 2. `start` spawns a dispatcher that spaces dispatch starts by a random
//!    delay in `[min_delay, max_delay]` and keeps at most `concurrency` tasks
//!    in flight.
//! 3. Transient failures are retried with exponential backoff; fatal ones
//!    are recorded at once.
//! 4. Every settlement emits `progress`; the last one (or a tripped circuit
//!    breaker) emits `done` with one outcome per task, in insertion order.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::QueueBuilder;
pub use config::QueueConfig;
pub use domain::{
    ErrorKind, Operation, Outcome, OutcomeKind, ProgressSnapshot, QueueReport, ReportSummary,
    ResultEntry, Task, TaskError, TaskId, TaskStatus,
};
pub use error::{ConfigError, QueueError};
pub use observability::QueueCounts;
pub use queue::{Phase, Subscription, TaskQueue};
