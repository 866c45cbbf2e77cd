//! Progress events.

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Status of the task a progress event refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Nothing has settled yet.
    #[default]
    Pending,
    Success,
    Error,
    /// An attempt failed and the task is about to run again.
    Retrying,
}

/// Immutable view of the queue at the moment a task settled (or is retried).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub current_name: String,
    pub current_status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Attempt number of the settling task (0 when nothing has settled).
    #[serde(default)]
    pub attempt: u32,
}

impl ProgressSnapshot {
    /// Completed fraction in `[0.0, 1.0]`; an empty queue counts as done.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}
