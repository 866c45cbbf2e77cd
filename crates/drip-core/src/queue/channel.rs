//! Typed in-process event channel.
//!
//! - `subscribe` registers a listener and returns a [`Subscription`] that
//!   removes exactly that listener.
//! - `emit` calls the listeners registered at that moment, synchronously
//!   and in registration order.
//! - A panicking listener is logged and skipped; it never reaches the
//!   dispatcher and never stops the remaining listeners.
//!
//! Listeners are called without any internal lock held, so a listener may
//! subscribe, unsubscribe, or call back into the queue.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Listeners<E> = Mutex<Vec<(u64, Listener<E>)>>;

pub struct EventChannel<E> {
    name: &'static str,
    listeners: Arc<Listeners<E>>,
    next_id: AtomicU64,
}

impl<E: 'static> EventChannel<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, Arc::new(listener)));

        let weak = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                lock(&listeners).retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Deliver `event` to every listener; returns how many completed without panicking.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = lock(&self.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    tracing::error!(
                        channel = self.name,
                        panic = %panic_message(panic.as_ref()),
                        "event listener panicked; continuing"
                    );
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Handle returned by every registration.
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

fn lock<E>(listeners: &Listeners<E>) -> MutexGuard<'_, Vec<(u64, Listener<E>)>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
