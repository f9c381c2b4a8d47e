//! Observer registry with RAII unsubscribe handles.
//!
//! Handlers are stored behind `Arc` so that dispatch can snapshot the
//! current set, release the lock, and only then call out. A handler is
//! therefore free to subscribe or unsubscribe from inside its own
//! callback; changes apply to the next dispatch, never the current one.
//!
//! A handler that panics is logged and skipped. The panic does not reach
//! the dispatcher, which is usually the transport's driver task.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T: ?Sized> {
    entries: Vec<(u64, Handler<T>)>,
}

/// A broadcast fan-out of `&T` to every registered handler.
///
/// There is no queue and no backpressure: each dispatch calls every
/// handler synchronously, in registration order.
pub struct Registry<T: ?Sized> {
    slots: Arc<Mutex<Slots<T>>>,
    next_id: AtomicU64,
}

impl<T: ?Sized + 'static> Registry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                entries: Vec::new(),
            })),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a handler and returns the guard that removes it.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.slots).entries.push((id, Arc::new(handler)));

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    lock(&slots).entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Calls every currently registered handler with `value`.
    pub fn dispatch(&self, value: &T) {
        let snapshot: Vec<Handler<T>> = lock(&self.slots)
            .entries
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                tracing::error!("subscriber panicked; continuing with the rest");
            }
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        lock(&self.slots).entries.len()
    }

    /// Returns `true` if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + 'static> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Registry::subscribe`].
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe))
/// removes the handler. Use [`detach`](Self::detach) to keep the handler
/// registered for the lifetime of the registry.
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Removes the handler now.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Leaves the handler registered and discards the guard.
    pub fn detach(mut self) {
        self.remove = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

/// Locks a std mutex, recovering the data if a handler panicked while
/// it was held.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
