//! TaskQueue - the public surface of the queue.
//!
//! # Usage
//! ```ignore
//! let queue = TaskQueue::new(QueueConfig::new(200, 1600))?;
//! queue.add(Task::new("export-1", || async { Ok::<_, TaskError>(42) }))?;
//! queue.on_done(|report| println!("{:?}", report.summary()));
//! queue.start()?;
//! ```
//!
//! The queue is a cheap handle: clones share the same state, listeners and
//! background work.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info};

use super::channel::Subscription;
use super::dispatcher::{Shared, dispatch_loop};
use super::state::{Phase, StartAction};
use crate::app::QueueBuilder;
use crate::config::QueueConfig;
use crate::domain::{Operation, ProgressSnapshot, QueueReport, Task, TaskId};
use crate::error::{ConfigError, QueueError};
use crate::observability::QueueCounts;
use crate::ports::{Clock, JitterSource};

pub struct TaskQueue<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Queue with the system clock and thread-local jitter.
    pub fn new(config: QueueConfig) -> Result<Self, ConfigError> {
        QueueBuilder::new().config(config).build()
    }

    pub fn builder() -> QueueBuilder<T> {
        QueueBuilder::new()
    }

    pub(crate) fn from_parts(
        config: QueueConfig,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, clock, jitter)),
        }
    }

    /// Append a task at the tail.
    ///
    /// Allowed while idle or running; a running queue picks it up without
    /// another `start()`. Fails with [`QueueError::InvalidState`] once the
    /// run is completed or aborted.
    pub fn add(&self, task: Task<T>) -> Result<TaskId, QueueError> {
        let id = self.shared.lock_state().push(task)?;
        debug!(task_id = %id, "task added");
        Ok(id)
    }

    /// Shorthand for `add(Task::new(name, operation))`.
    pub fn add_operation<O>(&self, name: impl Into<String>, operation: O) -> Result<TaskId, QueueError>
    where
        O: Operation<T> + 'static,
    {
        self.add(Task::new(name, operation))
    }

    /// Begin processing.
    ///
    /// - idle with tasks: spawns the dispatcher on the current tokio runtime.
    /// - idle without tasks: `done` fires immediately with an empty report.
    /// - already running: no-op.
    /// - completed or aborted: [`QueueError::InvalidState`]; call `clear()` first.
    pub fn start(&self) -> Result<(), QueueError> {
        let handle = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;
        let action = self.shared.lock_state().start()?;

        match action {
            StartAction::AlreadyRunning => debug!("start ignored, queue already running"),
            StartAction::Spawn(cycle) => {
                info!(
                    epoch = cycle.epoch,
                    concurrency = self.shared.config.concurrency,
                    "queue started"
                );
                handle.spawn(dispatch_loop(Arc::clone(&self.shared), cycle));
            }
            StartAction::Finished(report) => {
                info!("queue started with no tasks");
                self.shared.done.emit(&report);
            }
        }
        Ok(())
    }

    /// Drop every pending and in-flight task and return to idle.
    ///
    /// Outcomes of work that was in flight are discarded and no `done` is
    /// emitted for the cleared run. Listeners stay registered.
    pub fn clear(&self) {
        let old = self.shared.lock_state().clear();
        debug!(epoch = old.epoch, "queue cleared");
    }

    pub fn on_progress<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.shared.progress.subscribe(listener)
    }

    pub fn on_done<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueueReport<T>) + Send + Sync + 'static,
    {
        self.shared.done.subscribe(listener)
    }

    /// Most recent progress, or an empty snapshot before any task settled.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.shared.lock_state().snapshot()
    }

    pub fn counts(&self) -> QueueCounts {
        self.shared.lock_state().counts()
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock_state().phase()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }
}

impl<T: Send + 'static> std::fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("phase", &self.phase())
            .field("counts", &self.counts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::domain::{TaskError, TaskStatus};
    use crate::ports::{FixedJitter, ManualClock};

    fn queue(concurrency: usize) -> TaskQueue<u32> {
        TaskQueue::builder()
            .concurrency(concurrency)
            .clock(ManualClock::new())
            .jitter(FixedJitter::constant(Duration::from_millis(200)))
            .build()
            .unwrap()
    }

    #[test]
    fn start_outside_runtime_fails() {
        let q = queue(1);
        q.add_operation("a", || async { Ok::<u32, TaskError>(1) }).unwrap();
        assert!(matches!(q.start(), Err(QueueError::NoRuntime)));
        assert_eq!(q.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn start_with_no_tasks_emits_empty_done() {
        let q = queue(1);
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        q.on_done(move |r: &QueueReport<u32>| *s.lock().unwrap() = Some((r.len(), r.aborted)));

        q.start().unwrap();

        assert_eq!(*seen.lock().unwrap(), Some((0, false)));
        assert_eq!(q.phase(), Phase::Completed);
        assert!(matches!(
            q.start(),
            Err(QueueError::InvalidState { operation: "start", .. })
        ));
    }

    #[tokio::test]
    async fn second_start_while_running_is_a_no_op() {
        let q = queue(1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        q.add_operation("slow", move || {
            let rx = Arc::clone(&rx);
            async move {
                if let Some(rx) = rx.lock().await.take() {
                    let _ = rx.await;
                }
                Ok::<u32, TaskError>(1)
            }
        })
        .unwrap();

        q.start().unwrap();
        q.start().unwrap();
        assert_eq!(q.phase(), Phase::Running);

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let done_tx = Mutex::new(Some(done_tx));
        q.on_done(move |r: &QueueReport<u32>| {
            if let Some(tx) = done_tx.lock().unwrap().take() {
                let _ = tx.send(r.summary());
            }
        });
        tx.send(()).unwrap();

        let summary = done_rx.await.unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(q.snapshot().current_status, TaskStatus::Success);
    }

    #[test]
    fn clones_share_state() {
        let q = queue(1);
        let other = q.clone();
        other.add_operation("a", || async { Ok::<u32, TaskError>(1) }).unwrap();
        assert_eq!(q.counts().total, 1);
        q.clear();
        assert_eq!(other.counts().total, 0);
    }
}
