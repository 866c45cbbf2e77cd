//! Domain model (ids, tasks, errors, outcomes, progress events).

pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod task;

pub use errors::{ErrorKind, TaskError};
pub use events::{ProgressSnapshot, TaskStatus};
pub use ids::TaskId;
pub use outcome::{Outcome, OutcomeKind, QueueReport, ReportSummary, ResultEntry};
pub use task::{Operation, Task};
