use serde::{Deserialize, Serialize};

/// Point-in-time counters of one queue run.
///
/// `completed = succeeded + failed`; after an abort,
/// `completed + cancelled + not_attempted = total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub not_attempted: usize,
}

impl QueueCounts {
    /// Every added task has reached a final slot.
    pub fn is_settled(&self) -> bool {
        self.completed + self.cancelled + self.not_attempted == self.total
    }
}
