//! Task record: a task plus the bookkeeping the queue attaches on `add`.

use std::sync::Arc;

use crate::domain::{Operation, Task, TaskId};

/// A queued task.
///
/// Design:
/// - `id` is unique per queue instance (never reused across `clear`).
/// - `slot` is the task's index in the current run's results.
pub struct TaskRecord<T: Send + 'static> {
    pub id: TaskId,
    pub slot: usize,
    pub task: Task<T>,
}

impl<T: Send + 'static> TaskRecord<T> {
    pub fn new(id: TaskId, slot: usize, task: Task<T>) -> Self {
        Self { id, slot, task }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn operation(&self) -> Arc<dyn Operation<T>> {
        self.task.operation()
    }
}

impl<T: Send + 'static> std::fmt::Debug for TaskRecord<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("name", &self.name())
            .finish()
    }
}
