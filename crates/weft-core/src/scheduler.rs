// SPDX-License-Identifier: Apache-2.0

//! Cooperative time-sliced scheduler.
//!
//! The scheduler owns the only drain loop of a subsystem: each
//! [`Scheduler::process`] call dequeues messages and forwards them to the
//! processor until the queue empties, the per-slice message budget is
//! reached, or the time budget elapses. Handler failures are counted in the
//! slice report and never abort the drain.
//!
//! Pausing short-circuits the next `process` call; in-flight handler
//! invocations are not cancelled. Priority and policy updates take effect on
//! the next slice.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::trace;

use crate::config::{SchedulerConfig, SchedulingStrategy};
use crate::message::Message as _;
use crate::processor::Processor;
use crate::queue::MessageQueue;
use crate::stats::StatsHandle;

/// Errors raised by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `set_priority` received a negative value.
    #[error("invalid scheduler priority: {value}")]
    InvalidPriority {
        /// The rejected value.
        value: i64,
    },
}

/// Outcome classification of one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStatus {
    /// The drain loop ran to one of its bounds.
    Completed,
    /// The scheduler was paused; nothing was dequeued.
    Paused,
}

/// Report of one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceReport {
    /// Whether the slice ran or was short-circuited by a pause.
    pub status: SliceStatus,
    /// Messages dispatched (including those whose handler failed).
    pub processed: usize,
    /// Messages whose dispatch failed.
    pub errors: usize,
    /// Wall time spent draining.
    pub processing_time: Duration,
    /// Unused budget; only reported by a paused slice.
    pub remaining_time: Option<Duration>,
}

impl SliceReport {
    fn paused(budget: Duration) -> Self {
        Self {
            status: SliceStatus::Paused,
            processed: 0,
            errors: 0,
            processing_time: Duration::ZERO,
            remaining_time: Some(budget),
        }
    }
}

/// Live-applicable scheduler policy update.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerUpdate {
    /// New drain ordering strategy.
    pub strategy: Option<SchedulingStrategy>,
    /// New per-slice message budget.
    pub max_messages_per_slice: Option<usize>,
    /// New debug-trace flag.
    pub debug: Option<bool>,
}

#[derive(Debug)]
struct State {
    paused: bool,
    processing: bool,
    priority: u32,
    strategy: SchedulingStrategy,
    max_messages_per_slice: usize,
    debug: bool,
}

/// Cooperative time-sliced drain of the queue into the processor.
pub struct Scheduler {
    queue: Arc<MessageQueue>,
    processor: Arc<Processor>,
    stats: Option<StatsHandle>,
    state: Mutex<State>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scheduler")
            .field("paused", &state.paused)
            .field("processing", &state.processing)
            .field("priority", &state.priority)
            .field("strategy", &state.strategy)
            .field("max_messages_per_slice", &state.max_messages_per_slice)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler over the given queue and processor, applying the
    /// configured strategy to the queue.
    #[must_use]
    pub fn new(
        queue: Arc<MessageQueue>,
        processor: Arc<Processor>,
        config: &SchedulerConfig,
        stats: Option<StatsHandle>,
    ) -> Self {
        queue.set_fifo(config.scheduling_strategy == SchedulingStrategy::Fifo);
        Self {
            queue,
            processor,
            stats,
            state: Mutex::new(State {
                paused: false,
                processing: false,
                priority: config.priority,
                strategy: config.scheduling_strategy,
                max_messages_per_slice: config.max_messages_per_slice,
                debug: config.debug,
            }),
        }
    }

    /// Drains the queue for at most `slice` of wall time.
    ///
    /// Returns a paused report without touching the queue when the scheduler
    /// is paused. Otherwise dequeues until the queue empties, the per-slice
    /// budget is reached, or the time budget elapses; handler failures are
    /// counted and the drain continues.
    pub fn process(&self, slice: Duration) -> SliceReport {
        let (max, debug) = {
            let mut state = self.state.lock();
            if state.paused {
                return SliceReport::paused(slice);
            }
            state.processing = true;
            (state.max_messages_per_slice, state.debug)
        };

        if let Some(stats) = &self.stats {
            stats.on_time_slice(slice);
        }

        let start = Instant::now();
        let mut processed = 0;
        let mut errors = 0;
        while processed < max && start.elapsed() < slice {
            let Some(entry) = self.queue.dequeue() else {
                break;
            };
            if debug {
                trace!(path = entry.msg.path(), "slice dispatch");
            }
            processed += 1;
            if self.processor.process_message(&entry.msg).is_err() {
                errors += 1;
            }
        }

        self.state.lock().processing = false;
        SliceReport {
            status: SliceStatus::Completed,
            processed,
            errors,
            processing_time: start.elapsed(),
            remaining_time: None,
        }
    }

    /// Pauses processing: the next `process` call returns immediately.
    pub fn pause_processing(&self) {
        self.state.lock().paused = true;
    }

    /// Resumes processing.
    pub fn resume_processing(&self) {
        self.state.lock().paused = false;
    }

    /// Whether the scheduler is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Whether a `process` call is currently draining.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.state.lock().processing
    }

    /// Sets the scheduler priority. Negative values are rejected.
    pub fn set_priority(&self, priority: i64) -> Result<(), SchedulerError> {
        let value =
            u32::try_from(priority).map_err(|_| SchedulerError::InvalidPriority { value: priority })?;
        self.state.lock().priority = value;
        Ok(())
    }

    /// Current scheduler priority.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.state.lock().priority
    }

    /// Current drain strategy.
    #[must_use]
    pub fn strategy(&self) -> SchedulingStrategy {
        self.state.lock().strategy
    }

    /// Current per-slice message budget.
    #[must_use]
    pub fn max_messages_per_slice(&self) -> usize {
        self.state.lock().max_messages_per_slice
    }

    /// Applies a policy update; changes take effect on the next slice.
    pub fn configure(&self, update: SchedulerUpdate) {
        let mut state = self.state.lock();
        if let Some(strategy) = update.strategy {
            state.strategy = strategy;
            self.queue.set_fifo(strategy == SchedulingStrategy::Fifo);
        }
        if let Some(max) = update.max_messages_per_slice {
            state.max_messages_per_slice = max;
        }
        if let Some(debug) = update.debug {
            state.debug = debug;
        }
    }

    /// The processor this scheduler drains into.
    #[must_use]
    pub fn processor(&self) -> &Arc<Processor> {
        &self.processor
    }
}
