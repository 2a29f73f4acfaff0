// SPDX-License-Identifier: Apache-2.0

//! Memoized topological orders for facet dependency graphs.
//!
//! Planning the same hook set twice should not pay for a second topological
//! sort. The cache keys on a content signature of the hook set — kind,
//! overwrite flag, and required set per facet, order-independent — and stores
//! the resulting order verbatim. Bounded LRU; least recently used evicted.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

/// 32-byte content signature of a hook set.
pub type Signature = [u8; 32];

/// Default number of cached orders.
pub const DEFAULT_GRAPH_CACHE_CAPACITY: usize = 64;

/// Shared graph cache handle, passed between builders via the subsystem ctx.
pub type SharedGraphCache = Arc<Mutex<GraphCache>>;

/// LRU cache of `signature → topological order`.
#[derive(Debug)]
pub struct GraphCache {
    entries: LruCache<Signature, Vec<String>>,
}

impl GraphCache {
    /// Creates a cache bounded to `capacity` entries (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity =
            NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Creates a shared cache with the default capacity.
    #[must_use]
    pub fn shared() -> SharedGraphCache {
        Arc::new(Mutex::new(Self::new(DEFAULT_GRAPH_CACHE_CAPACITY)))
    }

    /// Returns the stored order for `signature`, refreshing its recency.
    pub fn get(&mut self, signature: &Signature) -> Option<Vec<String>> {
        self.entries.get(signature).cloned()
    }

    /// Stores `order` under `signature`, evicting the least recently used
    /// entry when full.
    pub fn insert(&mut self, signature: Signature, order: Vec<String>) {
        self.entries.put(signature, order);
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached orders.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for GraphCache {
    fn default() -> Self {
        Self::new(DEFAULT_GRAPH_CACHE_CAPACITY)
    }
}

/// One facet's contribution to a hook-set signature.
#[derive(Debug, Clone)]
pub struct SignatureEntry {
    /// Facet kind.
    pub kind: String,
    /// Whether the producing hook overwrites an earlier facet of the kind.
    pub overwrite: bool,
    /// Required dependency kinds.
    pub required: Vec<String>,
}

/// Computes the order-independent signature of a hook set.
///
/// Entries are normalized (required sets sorted) and then sorted as a whole,
/// so two hook sets differing only in declaration order share a signature.
#[must_use]
pub fn signature(entries: &[SignatureEntry]) -> Signature {
    let mut lines: Vec<String> = entries
        .iter()
        .map(|e| {
            let mut required = e.required.clone();
            required.sort_unstable();
            format!("{}\u{1}{}\u{1}{}", e.kind, e.overwrite, required.join(","))
        })
        .collect();
    lines.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().into()
}
