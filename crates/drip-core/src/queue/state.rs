//! Queue state machine.
//!
//! Phases:
//! - Idle -> Running (start)
//! - Running -> Completed (last task settled)
//! - Running -> Aborted (circuit breaker tripped)
//! - any -> Idle (clear)
//!
//! All transitions happen here, under the queue's state lock. The async
//! side (dispatcher and attempt runners) only calls into these methods and
//! never mutates queue state directly.
//!
//! Every start cycle carries an epoch. Callers pass the epoch they were
//! started with; anything reported under an older epoch is ignored, which is
//! how settlements that raced a `clear()` are dropped.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::breaker::CircuitBreaker;
use super::record::TaskRecord;
use crate::config::QueueConfig;
use crate::domain::{
    Outcome, ProgressSnapshot, QueueReport, ResultEntry, Task, TaskError, TaskId, TaskStatus,
};
use crate::error::QueueError;
use crate::observability::QueueCounts;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Aborted,
    Completed,
}

impl Phase {
    /// Is this a terminal phase (only `clear` leaves it)?
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Aborted | Phase::Completed)
    }

    pub fn accepts_tasks(self) -> bool {
        matches!(self, Phase::Idle | Phase::Running)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Aborted => "aborted",
            Phase::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Handles shared by the background work of one start cycle.
#[derive(Debug, Clone)]
pub(crate) struct Cycle {
    pub epoch: u64,
    pub token: CancellationToken,
    pub wake: Arc<Notify>,
}

impl Cycle {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            token: CancellationToken::new(),
            wake: Arc::new(Notify::new()),
        }
    }
}

pub(crate) enum Readiness {
    /// A slot is free and a task is pending.
    Ready,
    Wait,
    /// The cycle is over (cleared, completed or aborted).
    Stop,
}

pub(crate) enum StartAction<T> {
    AlreadyRunning,
    Spawn(Cycle),
    /// Nothing was added; the run is complete immediately.
    Finished(QueueReport<T>),
}

pub(crate) struct Settlement<T> {
    pub progress: ProgressSnapshot,
    pub done: Option<QueueReport<T>>,
}

#[derive(Debug)]
struct InFlight {
    slot: usize,
    name: String,
    /// Attempt currently running (1-indexed).
    attempt: u32,
}

pub(crate) struct QueueState<T: Send + 'static> {
    phase: Phase,
    pending: VecDeque<TaskRecord<T>>,
    in_flight: BTreeMap<TaskId, InFlight>,
    results: Vec<Option<ResultEntry<T>>>,
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
    not_attempted: usize,
    breaker: CircuitBreaker,
    concurrency: usize,
    next_task_id: u64,
    last: ProgressSnapshot,
    cycle: Cycle,
}

impl<T: Send + 'static> QueueState<T> {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            phase: Phase::Idle,
            pending: VecDeque::new(),
            in_flight: BTreeMap::new(),
            results: Vec::new(),
            total: 0,
            completed: 0,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            not_attempted: 0,
            breaker: CircuitBreaker::new(config.abort_threshold, config.fatal_weight),
            concurrency: config.concurrency.max(1),
            next_task_id: 0,
            last: ProgressSnapshot::default(),
            cycle: Cycle::new(0),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    pub fn push(&mut self, task: Task<T>) -> Result<TaskId, QueueError> {
        if !self.phase.accepts_tasks() {
            return Err(QueueError::InvalidState {
                operation: "add",
                phase: self.phase,
            });
        }
        let id = self.allocate_task_id();
        let slot = self.results.len();
        self.results.push(None);
        self.pending.push_back(TaskRecord::new(id, slot, task));
        self.total += 1;
        self.cycle.wake.notify_one();
        Ok(id)
    }

    pub fn start(&mut self) -> Result<StartAction<T>, QueueError> {
        match self.phase {
            Phase::Running => Ok(StartAction::AlreadyRunning),
            Phase::Completed | Phase::Aborted => Err(QueueError::InvalidState {
                operation: "start",
                phase: self.phase,
            }),
            Phase::Idle if self.total == 0 => {
                self.phase = Phase::Completed;
                self.cycle.token.cancel();
                Ok(StartAction::Finished(QueueReport {
                    results: Vec::new(),
                    aborted: false,
                }))
            }
            Phase::Idle => {
                self.phase = Phase::Running;
                self.cycle.wake.notify_one();
                Ok(StartAction::Spawn(self.cycle.clone()))
            }
        }
    }

    /// Has no `clear()` happened since the cycle `epoch` began?
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.cycle.epoch
    }

    pub fn readiness(&self, epoch: u64) -> Readiness {
        if epoch != self.cycle.epoch || self.phase != Phase::Running {
            Readiness::Stop
        } else if self.in_flight.len() < self.concurrency && !self.pending.is_empty() {
            Readiness::Ready
        } else {
            Readiness::Wait
        }
    }

    /// Pop the head of `pending` (FIFO) and mark it in flight.
    pub fn begin_dispatch(&mut self, epoch: u64) -> Option<TaskRecord<T>> {
        if !matches!(self.readiness(epoch), Readiness::Ready) {
            return None;
        }
        let record = self.pending.pop_front()?;
        self.in_flight.insert(
            record.id,
            InFlight {
                slot: record.slot,
                name: record.name().to_string(),
                attempt: 1,
            },
        );
        Some(record)
    }

    /// Attempt `failed_attempt` failed and the task will run again.
    pub fn retrying(
        &mut self,
        epoch: u64,
        id: TaskId,
        failed_attempt: u32,
    ) -> Option<ProgressSnapshot> {
        if epoch != self.cycle.epoch || self.phase != Phase::Running {
            return None;
        }
        let entry = self.in_flight.get_mut(&id)?;
        entry.attempt = failed_attempt + 1;
        self.last = ProgressSnapshot {
            current_name: entry.name.clone(),
            current_status: TaskStatus::Retrying,
            task_id: Some(id),
            attempt: failed_attempt,
            ..ProgressSnapshot::default()
        };
        Some(self.snapshot())
    }

    /// Record a task's final outcome.
    ///
    /// Returns `None` when the settlement is stale (cleared or aborted meanwhile).
    pub fn settle(&mut self, epoch: u64, id: TaskId, outcome: Outcome<T>) -> Option<Settlement<T>> {
        if epoch != self.cycle.epoch || self.phase != Phase::Running {
            return None;
        }
        let InFlight { slot, name, attempt } = self.in_flight.remove(&id)?;

        let tripped = match &outcome {
            Outcome::Success(_) => {
                self.breaker.record_success();
                self.succeeded += 1;
                false
            }
            Outcome::Failure { error, .. } => {
                self.failed += 1;
                self.breaker.record_failure(error)
            }
        };
        let status = if outcome.is_success() {
            TaskStatus::Success
        } else {
            TaskStatus::Error
        };
        self.completed += 1;
        self.last = ProgressSnapshot {
            current_name: name.clone(),
            current_status: status,
            task_id: Some(id),
            attempt,
            ..ProgressSnapshot::default()
        };
        self.results[slot] = Some(ResultEntry { id, name, outcome });
        let progress = self.snapshot();

        let done = if tripped {
            self.abort();
            Some(self.take_report(true))
        } else if self.pending.is_empty() && self.in_flight.is_empty() {
            self.phase = Phase::Completed;
            self.cycle.token.cancel();
            Some(self.take_report(false))
        } else {
            self.cycle.wake.notify_one();
            None
        };

        Some(Settlement { progress, done })
    }

    /// Breaker tripped: fill every open slot and stop the cycle.
    fn abort(&mut self) {
        self.phase = Phase::Aborted;
        for record in self.pending.drain(..) {
            self.results[record.slot] = Some(ResultEntry {
                id: record.id,
                name: record.name().to_string(),
                outcome: Outcome::not_attempted(),
            });
            self.not_attempted += 1;
        }
        for (id, flight) in std::mem::take(&mut self.in_flight) {
            self.results[flight.slot] = Some(ResultEntry {
                id,
                name: flight.name,
                outcome: Outcome::failure(TaskError::cancelled(), flight.attempt),
            });
            self.cancelled += 1;
        }
        self.cycle.token.cancel();
    }

    fn take_report(&mut self, aborted: bool) -> QueueReport<T> {
        let results = std::mem::take(&mut self.results)
            .into_iter()
            .flatten()
            .collect();
        QueueReport { results, aborted }
    }

    /// Back to Idle with empty bookkeeping. Returns the cycle that was
    /// current, already cancelled.
    pub fn clear(&mut self) -> Cycle {
        let next = Cycle::new(self.cycle.epoch + 1);
        let old = std::mem::replace(&mut self.cycle, next);
        old.token.cancel();

        self.phase = Phase::Idle;
        self.pending.clear();
        self.in_flight.clear();
        self.results.clear();
        self.total = 0;
        self.completed = 0;
        self.succeeded = 0;
        self.failed = 0;
        self.cancelled = 0;
        self.not_attempted = 0;
        self.breaker.reset();
        self.last = ProgressSnapshot::default();
        old
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed,
            ..self.last.clone()
        }
    }

    pub fn counts(&self) -> QueueCounts {
        QueueCounts {
            total: self.total,
            pending: self.pending.len(),
            in_flight: self.in_flight.len(),
            completed: self.completed,
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled: self.cancelled,
            not_attempted: self.not_attempted,
        }
    }
}
