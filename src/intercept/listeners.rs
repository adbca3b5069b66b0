//! Listener registration and dispatch.
//!
//! # Responsibilities
//! - Keep an ordered set of (event, callback) pairs
//! - Idempotent add, explicit remove, remove-all
//! - Invoke matching callbacks independently per dispatch
//!
//! # Design Decisions
//! - Pair identity is pointer equality of the callback `Arc`
//! - A panicking listener is contained at the dispatch boundary and reported
//!   through tracing, never through the instrumented path

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::intercept::types::{EventKind, RequestRecord};
use crate::observability::metrics;

/// Callback invoked with the current (partial or complete) request record.
pub type Listener = Arc<dyn Fn(&RequestRecord) + Send + Sync>;

/// Ordered set of (event, callback) pairs.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<Vec<(EventKind, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one lifecycle moment.
    ///
    /// Registering an identical (event, callback) pair twice is a no-op and
    /// returns `None`; otherwise an unsubscribe closure removing exactly
    /// that pair is returned.
    pub fn add(
        self: &Arc<Self>,
        event: EventKind,
        listener: Listener,
    ) -> Option<impl FnOnce() + Send + 'static> {
        {
            let mut entries = lock(&self.entries);
            if entries
                .iter()
                .any(|(e, l)| *e == event && Arc::ptr_eq(l, &listener))
            {
                return None;
            }
            entries.push((event, listener.clone()));
        }
        let registry = Arc::clone(self);
        Some(move || registry.remove(event, &listener))
    }

    /// Remove a specific (event, callback) pair; no-op when absent.
    pub fn remove(&self, event: EventKind, listener: &Listener) {
        lock(&self.entries).retain(|(e, l)| *e != event || !Arc::ptr_eq(l, listener));
    }

    /// Clear every entry regardless of event name.
    pub fn remove_all(&self) {
        lock(&self.entries).clear();
    }

    /// Invoke every callback registered for `event`, each in isolation.
    pub fn dispatch(&self, event: EventKind, record: &RequestRecord) {
        // Snapshot outside the lock so listeners may re-enter the registry.
        let matching: Vec<Listener> = lock(&self.entries)
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, l)| l.clone())
            .collect();

        for listener in matching {
            if catch_unwind(AssertUnwindSafe(|| listener(record))).is_err() {
                metrics::record_listener_fault(event.as_str());
                tracing::warn!(
                    event = event.as_str(),
                    id = record.id(),
                    "listener panicked during dispatch"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
