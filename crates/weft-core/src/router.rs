// SPDX-License-Identifier: Apache-2.0

//! Longest-prefix parameterized router with a versioned match cache.
//!
//! Patterns are `/`-segmented strings whose segments are literals, `{param}`
//! captures, or a final `*` wildcard matching one-or-more tail segments.
//! Among the patterns matching a concrete path, the one with the greatest
//! literal segment count wins; ties break by registration order.
//!
//! Matches are cached per concrete path in a bounded LRU. Entries are stamped
//! with the route-table version and revalidated on every hit, so registering
//! or unregistering a route invalidates the cache wholesale without a sweep.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use crate::config::RouterConfig;
use crate::message::Message;

/// Parameters captured from `{name}` placeholders, keyed by placeholder name.
pub type RouteParams = FxHashMap<String, String>;

/// Failure reported by a route handler.
#[derive(Debug, Error)]
#[error("handler failed: {reason}")]
pub struct HandlerError {
    /// Handler-supplied reason.
    pub reason: String,
}

impl HandlerError {
    /// Creates a handler error with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Handler invoked with the matched message, captured parameters, and the
/// route's registration metadata. Returns an optional reply value.
pub type RouteHandler =
    Arc<dyn Fn(&dyn Message, &RouteParams, &RouteMeta) -> Result<Option<Value>, HandlerError> + Send + Sync>;

/// Metadata stored alongside a handler at registration.
#[derive(Debug, Clone, Default)]
pub struct RouteMeta {
    /// Optional handler priority (informational).
    pub priority: Option<i64>,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Any further registration options.
    pub extra: Map<String, Value>,
}

/// Errors raised by router operations.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The pattern is already registered.
    #[error("duplicate pattern '{pattern}'")]
    DuplicatePattern {
        /// The colliding pattern.
        pattern: String,
    },
    /// The pattern text does not satisfy the pattern grammar.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
    /// `unregister` was called for a pattern that is not registered.
    #[error("no route registered for pattern '{pattern}'")]
    UnknownPattern {
        /// The unknown pattern.
        pattern: String,
    },
    /// No registered pattern matches the path.
    #[error("no route matches path '{path}'")]
    NoRoute {
        /// The unroutable path.
        path: String,
    },
    /// The message cannot be routed at all.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// Why the message was rejected.
        reason: String,
    },
    /// The matched handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

// ============================================================================
// Pattern compilation
// ============================================================================

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A pattern compiled once at registration.
#[derive(Debug, Clone)]
struct CompiledPattern {
    segments: Vec<Segment>,
    literal_count: usize,
    param_count: usize,
    is_wildcard: bool,
}

fn compile_pattern(pattern: &str) -> Result<CompiledPattern, RouterError> {
    if pattern.is_empty() {
        return Err(RouterError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: "pattern must be non-empty".to_owned(),
        });
    }
    let raw: Vec<&str> = pattern.split('/').collect();
    let mut segments = Vec::with_capacity(raw.len());
    let mut literal_count = 0;
    let mut param_count = 0;
    let mut is_wildcard = false;

    for (i, seg) in raw.iter().enumerate() {
        if seg.is_empty() {
            return Err(RouterError::InvalidPattern {
                pattern: pattern.to_owned(),
                reason: "empty segment".to_owned(),
            });
        }
        if *seg == "*" {
            if i != raw.len() - 1 {
                return Err(RouterError::InvalidPattern {
                    pattern: pattern.to_owned(),
                    reason: "'*' may appear only as the final segment".to_owned(),
                });
            }
            is_wildcard = true;
            segments.push(Segment::Wildcard);
        } else if let Some(name) = seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if name.is_empty() {
                return Err(RouterError::InvalidPattern {
                    pattern: pattern.to_owned(),
                    reason: "empty parameter name".to_owned(),
                });
            }
            param_count += 1;
            segments.push(Segment::Param(name.to_owned()));
        } else {
            literal_count += 1;
            segments.push(Segment::Literal((*seg).to_owned()));
        }
    }

    Ok(CompiledPattern {
        segments,
        literal_count,
        param_count,
        is_wildcard,
    })
}

/// Attempts to match `path_segments` against a compiled pattern, capturing
/// parameters on success.
fn match_segments(compiled: &CompiledPattern, path_segments: &[&str]) -> Option<RouteParams> {
    let mut params = RouteParams::default();
    let mut i = 0;
    for segment in &compiled.segments {
        match segment {
            Segment::Literal(lit) => {
                if path_segments.get(i).copied() != Some(lit.as_str()) {
                    return None;
                }
                i += 1;
            }
            Segment::Param(name) => {
                let value = path_segments.get(i)?;
                params.insert(name.clone(), (*value).to_owned());
                i += 1;
            }
            Segment::Wildcard => {
                // One-or-more remaining segments, joined back with '/'.
                if i >= path_segments.len() {
                    return None;
                }
                params.insert("*".to_owned(), path_segments[i..].join("/"));
                return Some(params);
            }
        }
    }
    (i == path_segments.len()).then_some(params)
}

// ============================================================================
// Route table
// ============================================================================

struct Route {
    pattern: String,
    compiled: CompiledPattern,
    handler: RouteHandler,
    meta: Arc<RouteMeta>,
    seq: u64,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct RouteTable {
    slots: Vec<Option<Route>>,
    by_pattern: FxHashMap<String, usize>,
    /// Candidate slots indexed by leading literal segment.
    by_first_literal: FxHashMap<String, Vec<usize>>,
    /// Candidate slots whose first segment is a parameter or wildcard.
    dynamic_first: Vec<usize>,
    version: u64,
    next_seq: u64,
}

/// A successful match: the winning pattern, captured parameters, handler,
/// and registration metadata.
#[derive(Clone)]
pub struct RouteMatch {
    /// The winning pattern.
    pub pattern: String,
    /// Captured `{name}` parameters (and `*` for wildcard tails).
    pub params: RouteParams,
    /// The registered handler.
    pub handler: RouteHandler,
    /// The registration metadata.
    pub meta: Arc<RouteMeta>,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct CachedMatch {
    version: u64,
    matched: RouteMatch,
}

/// Pattern registry with longest-literal matching and an LRU match cache.
pub struct Router {
    table: RwLock<RouteTable>,
    cache: Mutex<LruCache<String, CachedMatch>>,
    debug: bool,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.len())
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::with_config(&RouterConfig::default())
    }
}

impl Router {
    /// Creates a router with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router from a typed config.
    #[must_use]
    pub fn with_config(config: &RouterConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            table: RwLock::new(RouteTable::default()),
            cache: Mutex::new(LruCache::new(capacity)),
            debug: config.debug,
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers `handler` under `pattern` with the given metadata.
    pub fn register_route<F>(
        &self,
        pattern: &str,
        handler: F,
        meta: RouteMeta,
    ) -> Result<(), RouterError>
    where
        F: Fn(&dyn Message, &RouteParams, &RouteMeta) -> Result<Option<Value>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let compiled = compile_pattern(pattern)?;
        let mut table = self.table.write();
        if table.by_pattern.contains_key(pattern) {
            return Err(RouterError::DuplicatePattern {
                pattern: pattern.to_owned(),
            });
        }

        let seq = table.next_seq;
        table.next_seq += 1;
        let slot = table.slots.len();
        let first = compiled.segments.first().cloned();
        table.slots.push(Some(Route {
            pattern: pattern.to_owned(),
            compiled,
            handler: Arc::new(handler),
            meta: Arc::new(meta),
            seq,
        }));
        table.by_pattern.insert(pattern.to_owned(), slot);
        match first {
            Some(Segment::Literal(lit)) => {
                table.by_first_literal.entry(lit).or_default().push(slot);
            }
            _ => table.dynamic_first.push(slot),
        }
        table.version += 1;
        Ok(())
    }

    /// Registers a handler that does not inspect route metadata.
    pub fn register<F>(&self, pattern: &str, handler: F) -> Result<(), RouterError>
    where
        F: Fn(&dyn Message, &RouteParams) -> Result<Option<Value>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register_route(pattern, move |msg, params, _meta| handler(msg, params), RouteMeta::default())
    }

    /// Removes the route registered under `pattern`.
    pub fn unregister(&self, pattern: &str) -> Result<(), RouterError> {
        let mut table = self.table.write();
        let slot = table
            .by_pattern
            .remove(pattern)
            .ok_or_else(|| RouterError::UnknownPattern {
                pattern: pattern.to_owned(),
            })?;
        table.slots[slot] = None;
        for candidates in table.by_first_literal.values_mut() {
            candidates.retain(|&s| s != slot);
        }
        table.dynamic_first.retain(|&s| s != slot);
        table.version += 1;
        Ok(())
    }

    /// Registered patterns, in registration order.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        let table = self.table.read();
        let mut routes: Vec<(u64, String)> = table
            .slots
            .iter()
            .flatten()
            .map(|r| (r.seq, r.pattern.clone()))
            .collect();
        routes.sort_unstable_by_key(|(seq, _)| *seq);
        routes.into_iter().map(|(_, p)| p).collect()
    }

    /// Whether `pattern` is registered.
    #[must_use]
    pub fn has_pattern(&self, pattern: &str) -> bool {
        self.table.read().by_pattern.contains_key(pattern)
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().by_pattern.len()
    }

    /// Whether no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Matches a concrete path against the registered patterns.
    ///
    /// Returns the match record of the winning pattern, consulting and
    /// populating the match cache.
    pub fn match_path(&self, path: &str) -> Result<RouteMatch, RouterError> {
        let table = self.table.read();
        {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get(path) {
                if entry.version == table.version {
                    if self.debug {
                        trace!(path, pattern = %entry.matched.pattern, "route cache hit");
                    }
                    return Ok(entry.matched.clone());
                }
            }
        }

        let matched = Self::match_slow(&table, path).ok_or_else(|| RouterError::NoRoute {
            path: path.to_owned(),
        })?;
        if self.debug {
            trace!(path, pattern = %matched.pattern, "route matched");
        }

        let mut cache = self.cache.lock();
        cache.put(
            path.to_owned(),
            CachedMatch {
                version: table.version,
                matched: matched.clone(),
            },
        );
        Ok(matched)
    }

    fn match_slow(table: &RouteTable, path: &str) -> Option<RouteMatch> {
        let segments: Vec<&str> = path.split('/').collect();
        let first = *segments.first()?;

        let literal_candidates = table
            .by_first_literal
            .get(first)
            .map_or(&[][..], Vec::as_slice);
        let candidates = literal_candidates.iter().chain(table.dynamic_first.iter());

        let mut best: Option<(&Route, RouteParams)> = None;
        for &slot in candidates {
            let Some(route) = table.slots.get(slot).and_then(Option::as_ref) else {
                continue;
            };
            let Some(params) = match_segments(&route.compiled, &segments) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((current, _)) => {
                    route.compiled.literal_count > current.compiled.literal_count
                        || (route.compiled.literal_count == current.compiled.literal_count
                            && route.seq < current.seq)
                }
            };
            if better {
                best = Some((route, params));
            }
        }

        best.map(|(route, params)| RouteMatch {
            pattern: route.pattern.clone(),
            params,
            handler: route.handler.clone(),
            meta: route.meta.clone(),
        })
    }

    /// Routes a message: validates its path, matches, and invokes the handler
    /// with `(msg, params, meta)`.
    pub fn route(&self, msg: &dyn Message) -> Result<Option<Value>, RouterError> {
        let path = msg.path();
        if path.is_empty() {
            return Err(RouterError::InvalidMessage {
                reason: "message path is empty".to_owned(),
            });
        }
        let matched = self.match_path(path)?;
        let reply = (matched.handler)(msg, &matched.params, &matched.meta)?;
        Ok(reply)
    }

    /// Number of cached path matches (for diagnostics).
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}
