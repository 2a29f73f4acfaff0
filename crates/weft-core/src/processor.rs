// SPDX-License-Identifier: Apache-2.0

//! Message processor: the glue between router, queue, and observers.
//!
//! `accept` is the asynchronous path — enqueue and return. `process_message`
//! runs one message through the router and answers queries. `process_tick`
//! drains the queue. `process_immediately` bypasses the queue entirely; the
//! synchronous facet exposes it for inline processing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::message::{Message as _, SharedMessage};
use crate::queries::QueryRegistry;
use crate::queue::{EnqueueOptions, EnqueueOutcome, MessageQueue, QueueError};
use crate::router::{Router, RouterError};
use crate::stats::StatsHandle;

/// Errors raised by processor operations.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Routing or handler failure.
    #[error(transparent)]
    Router(#[from] RouterError),
    /// The queue refused the message.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result of a queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Messages dispatched (including those whose handler failed).
    pub processed: usize,
    /// Messages whose dispatch failed.
    pub errors: usize,
}

/// Accept/tick/immediate dispatch over a router and queue.
pub struct Processor {
    router: Arc<Router>,
    queue: Arc<MessageQueue>,
    stats: Option<StatsHandle>,
    queries: Option<Arc<QueryRegistry>>,
    errors: AtomicU64,
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("errors", &self.errors.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Creates a processor over the given router and queue.
    #[must_use]
    pub fn new(router: Arc<Router>, queue: Arc<MessageQueue>) -> Self {
        Self {
            router,
            queue,
            stats: None,
            queries: None,
            errors: AtomicU64::new(0),
        }
    }

    /// Creates a processor with optional observers installed.
    #[must_use]
    pub fn with_observers(
        router: Arc<Router>,
        queue: Arc<MessageQueue>,
        stats: Option<StatsHandle>,
        queries: Option<Arc<QueryRegistry>>,
    ) -> Self {
        Self {
            router,
            queue,
            stats,
            queries,
            errors: AtomicU64::new(0),
        }
    }

    /// The router this processor dispatches through.
    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// The queue this processor drains.
    #[must_use]
    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// Enqueues a message with default options and returns immediately.
    pub fn accept(&self, msg: SharedMessage) -> Result<EnqueueOutcome, ProcessorError> {
        self.accept_with(msg, EnqueueOptions::default())
    }

    /// Enqueues a message with explicit options and returns immediately.
    pub fn accept_with(
        &self,
        msg: SharedMessage,
        options: EnqueueOptions,
    ) -> Result<EnqueueOutcome, ProcessorError> {
        debug!(path = msg.path(), "message accepted");
        Ok(self.queue.enqueue(msg, options)?)
    }

    /// Runs one message: router match, handler invocation, query reply.
    ///
    /// Failures increment the processor's error counter and propagate; the
    /// caller decides whether to keep draining.
    pub fn process_message(&self, msg: &SharedMessage) -> Result<Option<Value>, ProcessorError> {
        let path = msg.path().to_owned();
        if path.is_empty() {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return Err(RouterError::InvalidMessage {
                reason: "message path is empty".to_owned(),
            }
            .into());
        }

        if msg.is_query() {
            if let Some(queries) = &self.queries {
                queries.record_issued(msg.id(), &path);
            }
        }

        let matched = match self.router.match_path(&path) {
            Ok(matched) => matched,
            Err(err) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                return Err(err.into());
            }
        };

        let reply = match (matched.handler)(msg.as_ref(), &matched.params, &matched.meta) {
            Ok(reply) => reply,
            Err(err) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                if let Some(stats) = &self.stats {
                    stats.on_handler_error(&path);
                }
                warn!(path, error = %err, "handler failed");
                return Err(RouterError::from(err).into());
            }
        };

        if let Some(stats) = &self.stats {
            stats.on_routed(&path, &matched.pattern);
        }

        if msg.is_query() {
            if let Some(value) = reply.clone() {
                msg.set_query_result(value);
                if let Some(queries) = &self.queries {
                    queries.record_answered(msg.id());
                }
            }
        }
        Ok(reply)
    }

    /// Drains the queue until empty, swallowing per-message failures.
    pub fn process_tick(&self) -> TickReport {
        let mut report = TickReport::default();
        while let Some(entry) = self.queue.dequeue() {
            report.processed += 1;
            if self.process_message(&entry.msg).is_err() {
                report.errors += 1;
            }
        }
        report
    }

    /// Processes a message synchronously, bypassing the queue.
    pub fn process_immediately(&self, msg: &SharedMessage) -> Result<Option<Value>, ProcessorError> {
        self.process_message(msg)
    }

    /// Total per-message failures observed since construction.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}
