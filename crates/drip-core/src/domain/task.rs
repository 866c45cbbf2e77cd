//! Task and operation definitions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::errors::TaskError;

/// The unit of work a task performs (typically one remote fetch).
///
/// An operation may be invoked more than once when the queue retries it,
/// so it has to be safe to call repeatedly.
///
/// Any `Fn() -> impl Future<Output = Result<T, TaskError>>` is an operation:
/// ```ignore
/// let task = Task::new("conversation 42", move || {
///     let client = client.clone();
///     async move { client.fetch(42).await.map_err(TaskError::from) }
/// });
/// ```
#[async_trait]
pub trait Operation<T: Send + 'static>: Send + Sync {
    async fn run(&self) -> Result<T, TaskError>;
}

#[async_trait]
impl<T, F, Fut> Operation<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    async fn run(&self) -> Result<T, TaskError> {
        (self)().await
    }
}

/// A named operation waiting to be added to a queue.
///
/// The queue assigns the `TaskId` on `add`; the task itself is immutable.
pub struct Task<T: Send + 'static> {
    name: String,
    operation: Arc<dyn Operation<T>>,
}

impl<T: Send + 'static> Task<T> {
    pub fn new(name: impl Into<String>, operation: impl Operation<T> + 'static) -> Self {
        Self {
            name: name.into(),
            operation: Arc::new(operation),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn operation(&self) -> Arc<dyn Operation<T>> {
        Arc::clone(&self.operation)
    }
}

impl<T: Send + 'static> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Countdown {
        left: AtomicU32,
    }

    #[async_trait]
    impl Operation<&'static str> for Countdown {
        async fn run(&self) -> Result<&'static str, TaskError> {
            if self.left.load(Ordering::Relaxed) > 0 {
                self.left.fetch_sub(1, Ordering::Relaxed);
                return Err(TaskError::transient("not yet"));
            }
            Ok("done")
        }
    }

    #[tokio::test]
    async fn closures_are_operations() {
        let task = Task::new("closure", || async { Ok::<_, TaskError>(5) });
        assert_eq!(task.name(), "closure");
        assert_eq!(task.operation().run().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn structs_are_operations_and_can_be_rerun() {
        let task = Task::new(
            "countdown",
            Countdown {
                left: AtomicU32::new(1),
            },
        );
        let op = task.operation();
        assert!(op.run().await.is_err());
        assert_eq!(op.run().await.unwrap(), "done");
    }
}
