// SPDX-License-Identifier: Apache-2.0

//! Event listener registry.
//!
//! Harnesses observe subsystem lifecycle events — build completion, disposal,
//! and whatever user facets choose to emit — by registering named listeners.
//! Emission is synchronous and in registration order.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Callback invoked with the event name and payload.
pub type ListenerFn = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Inner {
    next: u64,
    by_event: FxHashMap<String, Vec<(u64, ListenerFn)>>,
}

/// Registry of named event listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<Inner>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ListenerRegistry")
            .field("events", &inner.by_event.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `event`; returns a handle for removal.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next;
        inner.next += 1;
        inner
            .by_event
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(listener)));
        ListenerId(id)
    }

    /// Removes the listener registered under `id`. Returns whether it existed.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let mut removed = false;
        for listeners in inner.by_event.values_mut() {
            let before = listeners.len();
            listeners.retain(|(lid, _)| *lid != id.0);
            removed |= listeners.len() != before;
        }
        removed
    }

    /// Emits `event` with `payload` to every matching listener, in
    /// registration order. Returns the number of listeners notified.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let listeners: Vec<ListenerFn> = {
            let inner = self.inner.lock();
            inner
                .by_event
                .get(event)
                .map(|l| l.iter().map(|(_, f)| f.clone()).collect())
                .unwrap_or_default()
        };
        for listener in &listeners {
            listener(event, payload);
        }
        listeners.len()
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.inner.lock().by_event.get(event).map_or(0, Vec::len)
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.inner.lock().by_event.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_registered_listeners_in_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["one", "two"] {
            let seen = order.clone();
            let _ = registry.on("built", move |_event, _payload| {
                seen.lock().push(tag);
            });
        }

        let notified = registry.emit("built", &json!({}));
        assert_eq!(notified, 2);
        assert_eq!(*order.lock(), vec!["one", "two"]);
    }

    #[test]
    fn off_removes_one_listener() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let id = registry.on("tick", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.off(id));
        assert!(!registry.off(id), "second removal finds nothing");
        registry.emit("tick", &Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn emit_without_listeners_notifies_nobody() {
        let registry = ListenerRegistry::new();
        assert_eq!(registry.emit("ghost", &Value::Null), 0);
    }
}
