//! Outcome model: what a task ended with, and the report a finished run
//! hands to `done` listeners.
//!
//! Every task added to a run owns exactly one `ResultEntry` in the report,
//! in the order the tasks were added. Failed and never-dispatched tasks keep
//! their slot so callers can present partial results.

use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, TaskError};
use super::ids::TaskId;

/// Classification of a task's final outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
    NotAttempted,
}

#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure { error: TaskError, attempts: u32 },
}

impl<T> Outcome<T> {
    pub fn failure(error: TaskError, attempts: u32) -> Self {
        Outcome::Failure { error, attempts }
    }

    pub fn not_attempted() -> Self {
        Outcome::Failure {
            error: TaskError::not_attempted(),
            attempts: 0,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::Failure { error, .. } if error.kind() == ErrorKind::NotAttempted => {
                OutcomeKind::NotAttempted
            }
            Outcome::Failure { .. } => OutcomeKind::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(v) => Some(v),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Success(v) => Some(v),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }
}

/// One slot of the final report.
#[derive(Debug)]
pub struct ResultEntry<T> {
    pub id: TaskId,
    pub name: String,
    pub outcome: Outcome<T>,
}

/// Per-kind totals of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

/// Payload of the `done` event.
#[derive(Debug)]
pub struct QueueReport<T> {
    /// Ordered by insertion, independent of completion order.
    pub results: Vec<ResultEntry<T>>,
    /// True when the consecutive-failure threshold ended the run early.
    pub aborted: bool,
}

impl<T> QueueReport<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &ResultEntry<T>> {
        self.results.iter().filter(|e| e.outcome.is_success())
    }

    /// Tasks that ran and failed (not-attempted slots excluded).
    pub fn failures(&self) -> impl Iterator<Item = &ResultEntry<T>> {
        self.results
            .iter()
            .filter(|e| e.outcome.kind() == OutcomeKind::Failure)
    }

    pub fn not_attempted(&self) -> impl Iterator<Item = &ResultEntry<T>> {
        self.results
            .iter()
            .filter(|e| e.outcome.kind() == OutcomeKind::NotAttempted)
    }

    /// Successful values in insertion order.
    pub fn values(&self) -> Vec<&T> {
        self.results.iter().filter_map(|e| e.outcome.value()).collect()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for entry in &self.results {
            match entry.outcome.kind() {
                OutcomeKind::Success => summary.succeeded += 1,
                OutcomeKind::Failure => summary.failed += 1,
                OutcomeKind::NotAttempted => summary.not_attempted += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, outcome: Outcome<&'static str>) -> ResultEntry<&'static str> {
        ResultEntry {
            id: TaskId::new(id),
            name: format!("t{id}"),
            outcome,
        }
    }

    #[test]
    fn outcome_kind_serializes_as_required_names() {
        let s = serde_json::to_string(&OutcomeKind::Success).unwrap();
        assert_eq!(s, "\"SUCCESS\"");

        let s = serde_json::to_string(&OutcomeKind::NotAttempted).unwrap();
        assert_eq!(s, "\"NOT_ATTEMPTED\"");
    }

    #[test]
    fn not_attempted_is_its_own_kind() {
        let o: Outcome<()> = Outcome::not_attempted();
        assert_eq!(o.kind(), OutcomeKind::NotAttempted);

        let o: Outcome<()> = Outcome::failure(TaskError::cancelled(), 1);
        assert_eq!(o.kind(), OutcomeKind::Failure);
    }

    #[test]
    fn report_partitions_outcomes() {
        let report = QueueReport {
            results: vec![
                entry(0, Outcome::Success("a")),
                entry(1, Outcome::failure(TaskError::fatal("denied"), 1)),
                entry(2, Outcome::not_attempted()),
                entry(3, Outcome::Success("d")),
            ],
            aborted: true,
        };

        assert_eq!(report.values(), vec![&"a", &"d"]);
        assert_eq!(
            report.summary(),
            ReportSummary {
                succeeded: 2,
                failed: 1,
                not_attempted: 1,
            }
        );
        let failed: Vec<_> = report.failures().map(|e| e.id).collect();
        assert_eq!(failed, vec![TaskId::new(1)]);
        assert_eq!(report.not_attempted().count(), 1);
    }
}
