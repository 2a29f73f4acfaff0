// SPDX-License-Identifier: Apache-2.0

//! Query bookkeeping.
//!
//! The processor records issued and answered queries here when the queries
//! facet is installed. Absence of this registry never blocks processing.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Tracks in-flight and answered queries.
#[derive(Debug, Default)]
pub struct QueryRegistry {
    pending: Mutex<FxHashMap<String, String>>,
    answered: AtomicU64,
}

impl QueryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a query message entering processing.
    pub fn record_issued(&self, id: &str, path: &str) {
        self.pending.lock().insert(id.to_owned(), path.to_owned());
    }

    /// Records a query being answered.
    pub fn record_answered(&self, id: &str) {
        if self.pending.lock().remove(id).is_some() {
            self.answered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Queries issued but not yet answered, as `(id, path)` pairs.
    #[must_use]
    pub fn pending(&self) -> Vec<(String, String)> {
        self.pending
            .lock()
            .iter()
            .map(|(id, path)| (id.clone(), path.clone()))
            .collect()
    }

    /// Number of unanswered queries.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of answered queries.
    #[must_use]
    pub fn answered_count(&self) -> u64 {
        self.answered.load(Ordering::Relaxed)
    }
}
