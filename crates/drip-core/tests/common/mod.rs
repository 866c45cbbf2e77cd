#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drip_core::ports::ManualClock;
use drip_core::{
    ErrorKind, OutcomeKind, ProgressSnapshot, QueueBuilder, QueueReport, Task, TaskError,
    TaskQueue,
};
use tokio::sync::mpsc;

/// Owned copy of one report slot (reports borrow into listeners).
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: String,
    pub kind: OutcomeKind,
    pub value: Option<String>,
    pub error: Option<ErrorKind>,
    pub attempts: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Digest {
    pub aborted: bool,
    pub slots: Vec<Slot>,
}

impl Digest {
    fn from_report(report: &QueueReport<String>) -> Self {
        let slots = report
            .results
            .iter()
            .map(|entry| {
                let (error, attempts) = match &entry.outcome {
                    drip_core::Outcome::Success(_) => (None, None),
                    drip_core::Outcome::Failure { error, attempts } => {
                        (Some(error.kind()), Some(*attempts))
                    }
                };
                Slot {
                    name: entry.name.clone(),
                    kind: entry.outcome.kind(),
                    value: entry.outcome.value().cloned(),
                    error,
                    attempts,
                }
            })
            .collect();
        Self {
            aborted: report.aborted,
            slots,
        }
    }

    pub fn kinds(&self) -> Vec<OutcomeKind> {
        self.slots.iter().map(|s| s.kind).collect()
    }

    pub fn values(&self) -> Vec<Option<String>> {
        self.slots.iter().map(|s| s.value.clone()).collect()
    }
}

/// A queue on virtual time with recorded events.
pub struct Harness {
    pub queue: TaskQueue<String>,
    pub clock: ManualClock,
    progress: Arc<Mutex<Vec<ProgressSnapshot>>>,
    done: mpsc::UnboundedReceiver<Digest>,
}

impl Harness {
    pub fn new(builder: QueueBuilder<String>) -> Self {
        let clock = ManualClock::new();
        let queue = builder.clock(clock.clone()).build().unwrap();

        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        queue.on_progress(move |snap| sink.lock().unwrap().push(snap.clone()));

        let (tx, done) = mpsc::unbounded_channel();
        queue.on_done(move |report| {
            let _ = tx.send(Digest::from_report(report));
        });

        Self {
            queue,
            clock,
            progress,
            done,
        }
    }

    pub async fn run(&mut self) -> Digest {
        self.queue.start().unwrap();
        self.next_done().await
    }

    pub async fn next_done(&mut self) -> Digest {
        tokio::time::timeout(Duration::from_secs(5), self.done.recv())
            .await
            .expect("done was not emitted")
            .expect("done channel closed")
    }

    /// True if a `done` is already queued.
    pub fn has_pending_done(&mut self) -> bool {
        self.done.try_recv().is_ok()
    }

    pub fn progress(&self) -> Vec<ProgressSnapshot> {
        self.progress.lock().unwrap().clone()
    }
}

pub fn ok_task(name: &str, value: &str) -> Task<String> {
    let value = value.to_string();
    Task::new(name, move || {
        let value = value.clone();
        async move { Ok::<String, TaskError>(value) }
    })
}

/// Fails with a transient error `fail_times` times, then returns `value`.
pub fn flaky_task(name: &str, fail_times: u32, value: &str, calls: Arc<AtomicU32>) -> Task<String> {
    let value = value.to_string();
    Task::new(name, move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let value = value.clone();
        async move {
            if n <= fail_times {
                Err(TaskError::transient(format!("attempt {n} rejected")))
            } else {
                Ok(value)
            }
        }
    })
}

pub fn fatal_task(name: &str, calls: Arc<AtomicU32>) -> Task<String> {
    Task::new(name, move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<String, TaskError>(TaskError::fatal("401 unauthorized")) }
    })
}

/// Never settles.
pub fn stuck_task(name: &str, calls: Arc<AtomicU32>) -> Task<String> {
    Task::new(name, move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<String, TaskError>>()
    })
}

pub fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
