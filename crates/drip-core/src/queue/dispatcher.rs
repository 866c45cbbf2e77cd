//! Dispatcher: drives one start cycle.
//!
//! - `dispatch_loop` (one per cycle) waits for a free slot and a pending
//!   task, passes the pacing gate, and spawns an attempt runner.
//! - `run_task` (one per dispatched task) invokes the operation, retries
//!   in place with backoff, and reports the final outcome.
//!
//! Both race every suspension point against the cycle's cancellation token,
//! so `clear()` and an abort stop them promptly. Queue state is only touched
//! through `QueueState` under the state lock, and that lock is never held
//! across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::channel::EventChannel;
use super::pacing::PacingGate;
use super::record::TaskRecord;
use super::retry::RetryPolicy;
use super::state::{Cycle, QueueState, Readiness, Settlement};
use crate::config::QueueConfig;
use crate::domain::{Outcome, ProgressSnapshot, QueueReport, TaskId};
use crate::ports::{Clock, JitterSource};

pub(crate) struct Shared<T: Send + 'static> {
    pub config: QueueConfig,
    pub retry: RetryPolicy,
    pub clock: Arc<dyn Clock>,
    pub jitter: Arc<dyn JitterSource>,
    gate: tokio::sync::Mutex<PacingGate>,
    state: Mutex<QueueState<T>>,
    /// Serializes emissions so listeners see events in settlement order.
    emission: Mutex<()>,
    pub progress: EventChannel<ProgressSnapshot>,
    pub done: EventChannel<QueueReport<T>>,
}

impl<T: Send + 'static> Shared<T> {
    pub fn new(config: QueueConfig, clock: Arc<dyn Clock>, jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config),
            gate: tokio::sync::Mutex::new(PacingGate::new(config.min_delay, config.max_delay)),
            state: Mutex::new(QueueState::new(&config)),
            emission: Mutex::new(()),
            progress: EventChannel::new("progress"),
            done: EventChannel::new("done"),
            config,
            clock,
            jitter,
        }
    }

    pub fn lock_state(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_emission(&self) -> MutexGuard<'_, ()> {
        self.emission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pass_gate(&self) {
        let mut gate = self.gate.lock().await;
        let waited = gate.pass(self.clock.as_ref(), self.jitter.as_ref()).await;
        if !waited.is_zero() {
            debug!(waited_ms = waited.as_millis() as u64, "pacing gate passed");
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock_state().is_current(epoch)
    }

    /// Emit a `retrying` progress event. Returns false if the cycle is gone.
    fn report_retry(&self, epoch: u64, id: TaskId, failed_attempt: u32) -> bool {
        let _emission = self.lock_emission();
        let snapshot = self.lock_state().retrying(epoch, id, failed_attempt);
        let Some(snapshot) = snapshot else {
            return false;
        };
        if !self.is_current(epoch) {
            return false;
        }
        self.progress.emit(&snapshot);
        self.is_current(epoch)
    }

    fn settle(&self, epoch: u64, id: TaskId, outcome: Outcome<T>) {
        let _emission = self.lock_emission();
        let settled = self.lock_state().settle(epoch, id, outcome);
        let Some(Settlement { progress, done }) = settled else {
            debug!(task_id = %id, epoch, "dropping stale settlement");
            return;
        };

        // a listener (or another thread) may clear the queue between emissions
        if !self.is_current(epoch) {
            return;
        }
        self.progress.emit(&progress);

        if let Some(report) = done {
            if !self.is_current(epoch) {
                debug!(epoch, "queue cleared before done, dropping report");
                return;
            }
            let summary = report.summary();
            if report.aborted {
                error!(
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    not_attempted = summary.not_attempted,
                    "too many consecutive failures, queue aborted"
                );
            } else {
                info!(
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "queue completed"
                );
            }
            self.done.emit(&report);
        }
    }
}

pub(crate) async fn dispatch_loop<T: Send + 'static>(shared: Arc<Shared<T>>, cycle: Cycle) {
    debug!(epoch = cycle.epoch, "dispatcher started");
    loop {
        loop {
            let readiness = shared.lock_state().readiness(cycle.epoch);
            match readiness {
                Readiness::Ready => break,
                Readiness::Stop => {
                    debug!(epoch = cycle.epoch, "dispatcher stopped");
                    return;
                }
                Readiness::Wait => {
                    tokio::select! {
                        _ = cycle.token.cancelled() => return,
                        _ = cycle.wake.notified() => {}
                    }
                }
            }
        }

        tokio::select! {
            _ = cycle.token.cancelled() => return,
            _ = shared.pass_gate() => {}
        }

        // the state may have changed while waiting at the gate
        let record = shared.lock_state().begin_dispatch(cycle.epoch);
        let Some(record) = record else {
            continue;
        };

        debug!(task_id = %record.id, name = record.name(), "dispatching task");
        tokio::spawn(run_task(Arc::clone(&shared), cycle.clone(), record));
    }
}

async fn run_task<T: Send + 'static>(shared: Arc<Shared<T>>, cycle: Cycle, record: TaskRecord<T>) {
    let operation = record.operation();
    let mut attempt: u32 = 1;

    let outcome = loop {
        let result = tokio::select! {
            _ = cycle.token.cancelled() => return,
            result = operation.run() => result,
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    info!(task_id = %record.id, attempts = attempt, "task succeeded after retry");
                }
                break Outcome::Success(value);
            }
            Err(err) if shared.retry.should_retry(&err, attempt) => {
                let delay = shared.retry.next_delay(attempt);
                warn!(
                    task_id = %record.id,
                    name = record.name(),
                    error = %err,
                    attempt,
                    max_attempts = shared.retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying"
                );
                if !shared.report_retry(cycle.epoch, record.id, attempt) {
                    return;
                }
                tokio::select! {
                    _ = cycle.token.cancelled() => return,
                    _ = async {
                        if !delay.is_zero() {
                            shared.clock.sleep(delay).await;
                        }
                        shared.pass_gate().await;
                    } => {}
                }
                attempt += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    warn!(task_id = %record.id, error = %err, attempts = attempt, "task failed after all attempts");
                } else {
                    warn!(task_id = %record.id, error = %err, "task failed with non-retryable error");
                }
                break Outcome::failure(err, attempt);
            }
        }
    };

    shared.settle(cycle.epoch, record.id, outcome);
}
