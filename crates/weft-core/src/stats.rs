// SPDX-License-Identifier: Apache-2.0

//! Statistics sink for message-plane observation.
//!
//! The queue, scheduler, and processor report enqueue/dequeue, time-slice,
//! route, and error events to a [`StatsSink`]. Sinks are strictly passive:
//! nothing in the message plane blocks on, or fails because of, a sink.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Shared handle to a statistics sink.
pub type StatsHandle = Arc<dyn StatsSink>;

/// Observer for message-plane events.
///
/// All methods default to no-ops so sinks implement only what they track.
pub trait StatsSink: Send + Sync {
    /// A message entered the queue. `depth` is the queue size after the insert.
    fn on_enqueued(&self, _path: &str, _priority: u32, _depth: usize) {}
    /// A message left the queue. `depth` is the queue size after the removal.
    fn on_dequeued(&self, _path: &str, _depth: usize) {}
    /// The scheduler received a processing slice of the given budget.
    fn on_time_slice(&self, _budget: Duration) {}
    /// A message was routed to the handler registered under `pattern`.
    fn on_routed(&self, _path: &str, _pattern: &str) {}
    /// A handler failed while processing the message at `path`.
    fn on_handler_error(&self, _path: &str) {}
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatsSink;

impl StatsSink for NullStatsSink {}

/// Counter-backed sink used by the statistics facet.
///
/// Counters are keyed by event name and read back via [`StatsRegistry::counter`]
/// or [`StatsRegistry::snapshot`].
#[derive(Debug, Default)]
pub struct StatsRegistry {
    counters: Mutex<FxHashMap<String, u64>>,
}

/// Counter key for enqueue events.
pub const STAT_ENQUEUED: &str = "messagesEnqueued";
/// Counter key for dequeue events.
pub const STAT_DEQUEUED: &str = "messagesDequeued";
/// Counter key for scheduler time slices.
pub const STAT_TIME_SLICES: &str = "timeSlicesReceived";
/// Counter key for routed messages.
pub const STAT_ROUTED: &str = "messagesRouted";
/// Counter key for handler failures.
pub const STAT_HANDLER_ERRORS: &str = "handlerErrors";

impl StatsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to the named counter, creating it at zero if absent.
    pub fn increment(&self, name: &str) {
        let mut counters = self.counters.lock();
        *counters.entry(name.to_owned()).or_insert(0) += 1;
    }

    /// Returns the named counter, or zero when it has never been incremented.
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> FxHashMap<String, u64> {
        self.counters.lock().clone()
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.counters.lock().clear();
    }
}

impl StatsSink for StatsRegistry {
    fn on_enqueued(&self, _path: &str, _priority: u32, _depth: usize) {
        self.increment(STAT_ENQUEUED);
    }

    fn on_dequeued(&self, _path: &str, _depth: usize) {
        self.increment(STAT_DEQUEUED);
    }

    fn on_time_slice(&self, _budget: Duration) {
        self.increment(STAT_TIME_SLICES);
    }

    fn on_routed(&self, _path: &str, _pattern: &str) {
        self.increment(STAT_ROUTED);
    }

    fn on_handler_error(&self, _path: &str) {
        self.increment(STAT_HANDLER_ERRORS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = StatsRegistry::new();
        assert_eq!(stats.counter(STAT_ENQUEUED), 0);
    }

    #[test]
    fn sink_events_increment_matching_counters() {
        let stats = StatsRegistry::new();
        stats.on_enqueued("a/b", 1, 1);
        stats.on_enqueued("a/b", 1, 2);
        stats.on_dequeued("a/b", 1);
        stats.on_time_slice(Duration::from_millis(100));
        stats.on_routed("a/b", "a/{x}");
        stats.on_handler_error("a/b");

        assert_eq!(stats.counter(STAT_ENQUEUED), 2);
        assert_eq!(stats.counter(STAT_DEQUEUED), 1);
        assert_eq!(stats.counter(STAT_TIME_SLICES), 1);
        assert_eq!(stats.counter(STAT_ROUTED), 1);
        assert_eq!(stats.counter(STAT_HANDLER_ERRORS), 1);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let stats = StatsRegistry::new();
        stats.increment("x");
        let snap = stats.snapshot();
        stats.increment("x");
        assert_eq!(snap.get("x"), Some(&1), "snapshot must not track later increments");
        assert_eq!(stats.counter("x"), 2);
    }

    #[test]
    fn reset_clears_counters() {
        let stats = StatsRegistry::new();
        stats.increment("x");
        stats.reset();
        assert_eq!(stats.counter("x"), 0);
    }
}
