// SPDX-License-Identifier: Apache-2.0

//! Facet manager: a transactional, insertion-ordered container of facets.
//!
//! The manager owns the `kind → facet` mapping of one subsystem. Additions
//! append to an active transaction (one is started implicitly when absent);
//! `commit` seals the additions, `rollback` disposes and removes them in
//! reverse insertion order. At most one transaction is active at a time.
//!
//! Attachment exposes a facet under its kind on the subsystem surface. The
//! transparent-property behavior of dynamic hosts is rendered as an explicit
//! attachment map with reserved-name conflict checks.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ctx::Ctx;
use crate::facet::{Facet, FacetError, InitArgs};

/// Shared, lockable facet handle.
pub type SharedFacet = Arc<RwLock<Facet>>;

/// Property names that attachment may never shadow.
pub const RESERVED_PROPERTIES: [&str; 6] =
    ["name", "ctx", "children", "hooks", "defaultHooks", "facets"];

/// Errors raised by facet-manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A kind argument was empty or did not match the facet's kind.
    #[error("invalid facet kind: {reason}")]
    InvalidKind {
        /// What was malformed.
        reason: String,
    },
    /// Two facets share a kind.
    #[error("duplicate facet kind '{kind}'")]
    DuplicateKind {
        /// The colliding kind.
        kind: String,
    },
    /// No facet is registered under the kind.
    #[error("no facet registered for kind '{kind}'")]
    NotFound {
        /// The missing kind.
        kind: String,
    },
    /// Attachment would shadow an existing subsystem property.
    #[error("property already exists on subsystem: '{name}'")]
    PropertyConflict {
        /// The conflicting property name.
        name: String,
    },
    /// `commit` or `rollback` was called with no active transaction.
    #[error("no active transaction")]
    NoTransaction,
    /// `begin_transaction` was called while one is already active.
    #[error("transaction already active")]
    TransactionActive,
    /// A facet operation failed during add or init.
    #[error(transparent)]
    Facet(#[from] FacetError),
}

/// Options for [`FacetManager::add`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AddOptions<'a> {
    /// Initialize the facet immediately after insertion.
    pub init: bool,
    /// Attach the facet if it asks to be attached.
    pub attach: bool,
    /// Context for initialization; an empty context is used when absent.
    pub ctx: Option<&'a Ctx>,
}

impl<'a> AddOptions<'a> {
    /// Insert only: no init, no attach.
    #[must_use]
    pub fn insert_only() -> Self {
        Self::default()
    }

    /// Init and attach against the given context — the build path.
    #[must_use]
    pub fn install(ctx: &'a Ctx) -> Self {
        Self {
            init: true,
            attach: true,
            ctx: Some(ctx),
        }
    }
}

/// Transactional `kind → facet` container for one subsystem.
#[derive(Debug)]
pub struct FacetManager {
    subsystem: String,
    entries: Vec<(String, SharedFacet)>,
    index: FxHashMap<String, usize>,
    attached: FxHashMap<String, SharedFacet>,
    transaction: Option<Vec<String>>,
}

impl FacetManager {
    /// Creates an empty manager for the named subsystem.
    #[must_use]
    pub fn new(subsystem: impl Into<String>) -> Self {
        Self {
            subsystem: subsystem.into(),
            entries: Vec::new(),
            index: FxHashMap::default(),
            attached: FxHashMap::default(),
            transaction: None,
        }
    }

    /// Name of the owning subsystem.
    #[must_use]
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    // ------------------------------------------------------------------
    // Additions
    // ------------------------------------------------------------------

    /// Adds `facet` under `kind`, appending to the active transaction
    /// (starting one if absent).
    ///
    /// With `init` set, the facet initializes immediately; an init failure
    /// removes the facet, disposes it, and propagates. With `attach` set,
    /// the facet is attached when it asks to be.
    pub fn add(
        &mut self,
        kind: &str,
        facet: Facet,
        opts: AddOptions<'_>,
    ) -> Result<(), ManagerError> {
        if kind.is_empty() {
            return Err(ManagerError::InvalidKind {
                reason: "kind must be a non-empty string".to_owned(),
            });
        }
        if facet.kind() != kind {
            return Err(ManagerError::InvalidKind {
                reason: format!("facet kind '{}' does not match key '{kind}'", facet.kind()),
            });
        }
        if self.index.contains_key(kind) {
            return Err(ManagerError::DuplicateKind {
                kind: kind.to_owned(),
            });
        }

        let shared: SharedFacet = Arc::new(RwLock::new(facet));
        self.entries.push((kind.to_owned(), shared.clone()));
        self.index.insert(kind.to_owned(), self.entries.len() - 1);
        self.transaction
            .get_or_insert_with(Vec::new)
            .push(kind.to_owned());

        if opts.init {
            let empty = Ctx::new();
            let ctx = opts.ctx.unwrap_or(&empty);
            let init_result = {
                let manager: &FacetManager = &*self;
                let mut guard = shared.write();
                guard.init(&InitArgs {
                    ctx,
                    manager,
                    subsystem: &manager.subsystem,
                })
            };
            if let Err(err) = init_result {
                warn!(kind, error = %err, "facet init failed; removing and disposing");
                let _ = self.remove_entry(kind);
                shared.read().dispose();
                return Err(err.into());
            }
        }

        if opts.attach && shared.read().should_attach() {
            self.attach(kind)?;
        }
        debug!(kind, subsystem = %self.subsystem, "facet added");
        Ok(())
    }

    /// Adds a sequence of facets under a single transaction.
    ///
    /// `ordered_kinds` gives the installation order; `by_kind` supplies the
    /// facets. Any failure rolls back every addition in reverse order and
    /// propagates; success commits.
    pub fn add_many(
        &mut self,
        ordered_kinds: &[String],
        by_kind: &mut FxHashMap<String, Facet>,
        opts: AddOptions<'_>,
    ) -> Result<(), ManagerError> {
        self.begin_transaction()?;
        for kind in ordered_kinds {
            let facet = match by_kind.remove(kind) {
                Some(facet) => facet,
                None => {
                    let err = ManagerError::NotFound { kind: kind.clone() };
                    self.abort_after(&err);
                    return Err(err);
                }
            };
            if let Err(err) = self.add(kind, facet, opts) {
                self.abort_after(&err);
                return Err(err);
            }
        }
        let _ = self.commit()?;
        Ok(())
    }

    fn abort_after(&mut self, err: &ManagerError) {
        warn!(error = %err, "add_many failed; rolling back");
        if let Err(rollback_err) = self.rollback() {
            warn!(error = %rollback_err, "rollback after failed add_many did not complete");
        }
    }

    // ------------------------------------------------------------------
    // Attachment
    // ------------------------------------------------------------------

    /// Exposes the facet registered under `kind` as a subsystem property.
    pub fn attach(&mut self, kind: &str) -> Result<(), ManagerError> {
        let shared = self.find(kind).ok_or_else(|| ManagerError::NotFound {
            kind: kind.to_owned(),
        })?;
        if RESERVED_PROPERTIES.contains(&kind) || self.attached.contains_key(kind) {
            return Err(ManagerError::PropertyConflict {
                name: kind.to_owned(),
            });
        }
        self.attached.insert(kind.to_owned(), shared);
        Ok(())
    }

    /// Returns the attached facet for `kind`, if any.
    #[must_use]
    pub fn attached(&self, kind: &str) -> Option<SharedFacet> {
        self.attached.get(kind).cloned()
    }

    /// Whether `kind` is attached.
    #[must_use]
    pub fn is_attached(&self, kind: &str) -> bool {
        self.attached.contains_key(kind)
    }

    /// Kinds currently attached, in no particular order.
    #[must_use]
    pub fn attached_kinds(&self) -> Vec<String> {
        self.attached.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Lookup and removal
    // ------------------------------------------------------------------

    /// Returns the facet registered under `kind`.
    #[must_use]
    pub fn find(&self, kind: &str) -> Option<SharedFacet> {
        self.index.get(kind).map(|&i| self.entries[i].1.clone())
    }

    /// Whether a facet is registered under `kind`.
    #[must_use]
    pub fn has(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    /// Registered kinds in insertion order.
    #[must_use]
    pub fn all_kinds(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Registered facets in insertion order, as a defensive copy.
    #[must_use]
    pub fn all(&self) -> Vec<SharedFacet> {
        self.entries.iter().map(|(_, f)| f.clone()).collect()
    }

    /// Number of registered facets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no facets are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(kind, facet)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedFacet)> {
        self.entries.iter().map(|(k, f)| (k.as_str(), f))
    }

    /// Removes the facet registered under `kind` without disposing it.
    pub fn remove(&mut self, kind: &str) -> Result<SharedFacet, ManagerError> {
        self.remove_entry(kind).ok_or_else(|| ManagerError::NotFound {
            kind: kind.to_owned(),
        })
    }

    /// Removes every facet and attachment without disposing.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.attached.clear();
        self.transaction = None;
    }

    fn remove_entry(&mut self, kind: &str) -> Option<SharedFacet> {
        let position = self.index.remove(kind)?;
        let (_, shared) = self.entries.remove(position);
        for (i, (k, _)) in self.entries.iter().enumerate().skip(position) {
            self.index.insert(k.clone(), i);
        }
        self.attached.remove(kind);
        Some(shared)
    }

    // ------------------------------------------------------------------
    // Bulk lifecycle
    // ------------------------------------------------------------------

    /// Initializes every registered facet in insertion order.
    pub fn init_all(&self, ctx: &Ctx) -> Result<(), ManagerError> {
        for (_, shared) in &self.entries {
            let mut guard = shared.write();
            guard.init(&InitArgs {
                ctx,
                manager: self,
                subsystem: &self.subsystem,
            })?;
        }
        Ok(())
    }

    /// Disposes every registered facet in insertion order, then clears the
    /// map. Dispose faults cannot propagate; the map is always cleared.
    pub fn dispose_all(&mut self) {
        for (kind, shared) in &self.entries {
            debug!(kind = %kind, subsystem = %self.subsystem, "disposing facet");
            shared.read().dispose();
        }
        self.clear();
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Starts a transaction. At most one may be active.
    pub fn begin_transaction(&mut self) -> Result<(), ManagerError> {
        if self.transaction.is_some() {
            return Err(ManagerError::TransactionActive);
        }
        self.transaction = Some(Vec::new());
        Ok(())
    }

    /// Seals the active transaction, returning the kinds it added.
    pub fn commit(&mut self) -> Result<Vec<String>, ManagerError> {
        self.transaction.take().ok_or(ManagerError::NoTransaction)
    }

    /// Aborts the active transaction: every kind it added is disposed and
    /// removed, in reverse insertion order.
    pub fn rollback(&mut self) -> Result<(), ManagerError> {
        let added = self.transaction.take().ok_or(ManagerError::NoTransaction)?;
        for kind in added.iter().rev() {
            // A failed init already removed its own facet; tolerate the gap.
            if let Some(shared) = self.remove_entry(kind) {
                shared.read().dispose();
            }
        }
        Ok(())
    }

    /// Whether a transaction is active.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Number of kinds added by the active transaction.
    #[must_use]
    pub fn transaction_len(&self) -> usize {
        self.transaction.as_ref().map_or(0, Vec::len)
    }
}
