//! Domain identifiers.
//!
//! Tasks are numbered in the order they are added. The number is never
//! reused by the same queue, even across `clear()`, so a late settlement can
//! always be told apart from a task of the current session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a task (sequence-assigned by the queue).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
