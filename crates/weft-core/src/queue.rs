// SPDX-License-Identifier: Apache-2.0

//! Priority message queue.
//!
//! Entries are ordered `(priority desc, enqueue sequence asc)`. FIFO mode
//! flattens priority to a constant at enqueue time, leaving pure sequence
//! order; a strategy switch therefore applies to entries enqueued after the
//! change, never retroactively.
//!
//! A bounded queue applies its overflow policy when full: `block` refuses the
//! enqueue with an error, `drop` discards the incoming message, `overflow`
//! evicts the lowest-ranked queued entry. Enqueue and dequeue notify the
//! statistics sink when one is installed; sinks never affect the operation.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{QueueConfig, QueuePolicy};
use crate::message::{Message as _, SharedMessage};
use crate::stats::StatsHandle;

/// Per-message enqueue options.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    /// Message priority; higher drains first under the priority strategy.
    pub priority: u32,
}

impl EnqueueOptions {
    /// Options with the given priority.
    #[must_use]
    pub fn with_priority(priority: u32) -> Self {
        Self { priority }
    }
}

/// What happened to an enqueued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The message was queued.
    Enqueued,
    /// The queue was full under the `drop` policy; the message was discarded.
    DroppedNew,
    /// The queue was full under the `overflow` policy; the lowest-ranked
    /// queued entry was evicted to make room.
    Evicted,
}

/// Errors raised by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A bounded queue refused an enqueue under the `block` policy.
    #[error("queue full (capacity {capacity})")]
    Full {
        /// The configured capacity.
        capacity: usize,
    },
}

/// A dequeued entry: the message plus its enqueue bookkeeping.
#[derive(Clone)]
pub struct QueuedEntry {
    /// The queued message.
    pub msg: SharedMessage,
    /// Options supplied at enqueue.
    pub options: EnqueueOptions,
    /// When the message entered the queue.
    pub enqueued_at: Instant,
}

impl fmt::Debug for QueuedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedEntry")
            .field("path", &self.msg.path())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

struct HeapEntry {
    effective_priority: u32,
    seq: u64,
    entry: QueuedEntry,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence first.
        self.effective_priority
            .cmp(&other.effective_priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
    capacity: usize,
    policy: QueuePolicy,
    fifo: bool,
    stats: Option<StatsHandle>,
}

/// Priority FIFO queue with statistics hooks.
pub struct MessageQueue {
    inner: Mutex<Inner>,
}

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MessageQueue")
            .field("len", &inner.heap.len())
            .field("capacity", &inner.capacity)
            .field("policy", &inner.policy)
            .field("fifo", &inner.fifo)
            .finish_non_exhaustive()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::with_config(&QueueConfig::default())
    }
}

impl MessageQueue {
    /// Creates an unbounded queue with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue from a typed config.
    #[must_use]
    pub fn with_config(config: &QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                capacity: config.capacity,
                policy: config.policy,
                fifo: false,
                stats: None,
            }),
        }
    }

    /// Installs the statistics sink notified on enqueue and dequeue.
    pub fn set_stats(&self, stats: StatsHandle) {
        self.inner.lock().stats = Some(stats);
    }

    /// Switches between priority and pure-FIFO ordering for entries enqueued
    /// from now on.
    pub fn set_fifo(&self, fifo: bool) {
        self.inner.lock().fifo = fifo;
    }

    /// Enqueues a message, applying the overflow policy when full.
    pub fn enqueue(
        &self,
        msg: SharedMessage,
        options: EnqueueOptions,
    ) -> Result<EnqueueOutcome, QueueError> {
        let mut inner = self.inner.lock();
        let mut outcome = EnqueueOutcome::Enqueued;

        if inner.capacity > 0 && inner.heap.len() >= inner.capacity {
            match inner.policy {
                QueuePolicy::Block => {
                    return Err(QueueError::Full {
                        capacity: inner.capacity,
                    })
                }
                QueuePolicy::Drop => return Ok(EnqueueOutcome::DroppedNew),
                QueuePolicy::Overflow => {
                    evict_lowest(&mut inner.heap);
                    outcome = EnqueueOutcome::Evicted;
                }
            }
        }

        let effective_priority = if inner.fifo { 0 } else { options.priority };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let path = msg.path().to_owned();
        inner.heap.push(HeapEntry {
            effective_priority,
            seq,
            entry: QueuedEntry {
                msg,
                options,
                enqueued_at: Instant::now(),
            },
        });

        let depth = inner.heap.len();
        if let Some(stats) = &inner.stats {
            stats.on_enqueued(&path, options.priority, depth);
        }
        Ok(outcome)
    }

    /// Removes and returns the highest-ranked entry.
    pub fn dequeue(&self) -> Option<QueuedEntry> {
        let mut inner = self.inner.lock();
        let popped = inner.heap.pop()?;
        let depth = inner.heap.len();
        if let Some(stats) = &inner.stats {
            stats.on_dequeued(popped.entry.msg.path(), depth);
        }
        Some(popped.entry)
    }

    /// Returns the highest-ranked message without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<SharedMessage> {
        self.inner.lock().heap.peek().map(|e| e.entry.msg.clone())
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Configured capacity; zero means unbounded.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Configured overflow policy.
    #[must_use]
    pub fn policy(&self) -> QueuePolicy {
        self.inner.lock().policy
    }
}

/// Removes the lowest-ranked entry. Queues applying `overflow` are expected
/// to be small; the linear rebuild is the simple correct choice.
fn evict_lowest(heap: &mut BinaryHeap<HeapEntry>) {
    let mut entries: Vec<HeapEntry> = std::mem::take(heap).into_vec();
    if let Some(lowest) = entries
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)
    {
        entries.swap_remove(lowest);
    }
    *heap = entries.into();
}
