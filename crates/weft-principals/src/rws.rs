// SPDX-License-Identifier: Apache-2.0

//! Reader/Writer Sets: the per-resource access control lattice.
//!
//! Readers and writers are disjoint uuid sets over one owning PKR. The
//! lattice is `grant ⇒ write ⇒ read`: the kernel and the owner hold every
//! capability, writers may read, and grant authority never leaves the
//! kernel and owner. Mutation of the sets is itself grant-guarded.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::pkr::Pkr;
use crate::registry::{PrincipalRegistry, RegistryError, SendError};

/// Shared, lockable reader/writer set.
pub type SharedRws = Arc<RwLock<ReaderWriterSet>>;

/// The three access capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Observe the resource.
    Read,
    /// Mutate the resource.
    Write,
    /// Change who may read or write.
    Grant,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Grant => "grant",
        })
    }
}

/// Errors raised by access-controlled operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The acting principal lacks the required capability.
    #[error("unauthorized: principal '{who}' may not {action}")]
    Unauthorized {
        /// Uuid of the refused principal.
        who: String,
        /// The refused action.
        action: String,
    },
    /// No kernel transport is available for a protected send.
    #[error("kernel missing or lacks protected send")]
    KernelAbsent,
    /// The underlying registry refused the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The kernel transport failed the send.
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Access control list over one owning PKR.
#[derive(Clone)]
pub struct ReaderWriterSet {
    owner: Pkr,
    readers: FxHashSet<String>,
    writers: FxHashSet<String>,
    registry: PrincipalRegistry,
}

impl fmt::Debug for ReaderWriterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderWriterSet")
            .field("owner", &self.owner.uuid())
            .field("readers", &self.readers.len())
            .field("writers", &self.writers.len())
            .finish_non_exhaustive()
    }
}

impl ReaderWriterSet {
    /// Creates an empty set owned by `owner`.
    #[must_use]
    pub fn new(owner: Pkr, registry: PrincipalRegistry) -> Self {
        Self {
            owner,
            readers: FxHashSet::default(),
            writers: FxHashSet::default(),
            registry,
        }
    }

    /// The owning PKR.
    #[must_use]
    pub fn owner(&self) -> &Pkr {
        &self.owner
    }

    /// Whether `pkr` is the kernel principal; kernel bypasses every check.
    #[must_use]
    pub fn is_kernel(&self, pkr: &Pkr) -> bool {
        self.registry.is_kernel(pkr)
    }

    /// Whether `pkr` is the owner.
    #[must_use]
    pub fn is_owner(&self, pkr: &Pkr) -> bool {
        self.owner.equals(pkr)
    }

    /// kernel ∨ owner ∨ reader ∨ writer.
    #[must_use]
    pub fn can_read(&self, pkr: &Pkr) -> bool {
        self.can_write(pkr) || self.readers.contains(pkr.uuid())
    }

    /// kernel ∨ owner ∨ writer.
    #[must_use]
    pub fn can_write(&self, pkr: &Pkr) -> bool {
        self.can_grant(pkr) || self.writers.contains(pkr.uuid())
    }

    /// kernel ∨ owner.
    #[must_use]
    pub fn can_grant(&self, pkr: &Pkr) -> bool {
        self.is_kernel(pkr) || self.is_owner(pkr)
    }

    /// Whether `pkr` holds the given capability.
    #[must_use]
    pub fn can(&self, kind: AccessKind, pkr: &Pkr) -> bool {
        match kind {
            AccessKind::Read => self.can_read(pkr),
            AccessKind::Write => self.can_write(pkr),
            AccessKind::Grant => self.can_grant(pkr),
        }
    }

    fn require_grant(&self, granter: &Pkr, action: &str) -> Result<(), AccessError> {
        if self.can_grant(granter) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized {
                who: granter.uuid().to_owned(),
                action: action.to_owned(),
            })
        }
    }

    /// Adds `target` to the readers. Writers already read; adding one is a
    /// no-op that keeps the sets disjoint.
    pub fn add_reader(&mut self, granter: &Pkr, target: &Pkr) -> Result<(), AccessError> {
        self.require_grant(granter, "grant read access")?;
        if !self.writers.contains(target.uuid()) {
            self.readers.insert(target.uuid().to_owned());
        }
        Ok(())
    }

    /// Removes `target` from the readers.
    pub fn remove_reader(&mut self, granter: &Pkr, target: &Pkr) -> Result<(), AccessError> {
        self.require_grant(granter, "revoke read access")?;
        self.readers.remove(target.uuid());
        Ok(())
    }

    /// Adds `target` to the writers, moving it out of the readers if needed.
    pub fn add_writer(&mut self, granter: &Pkr, target: &Pkr) -> Result<(), AccessError> {
        self.require_grant(granter, "grant write access")?;
        self.readers.remove(target.uuid());
        self.writers.insert(target.uuid().to_owned());
        Ok(())
    }

    /// Removes `target` from the writers.
    pub fn remove_writer(&mut self, granter: &Pkr, target: &Pkr) -> Result<(), AccessError> {
        self.require_grant(granter, "revoke write access")?;
        self.writers.remove(target.uuid());
        Ok(())
    }

    /// Moves `target` from readers to writers. Returns whether a move
    /// happened.
    pub fn promote(&mut self, granter: &Pkr, target: &Pkr) -> Result<bool, AccessError> {
        self.require_grant(granter, "promote to writer")?;
        let moved = self.readers.remove(target.uuid());
        if moved {
            self.writers.insert(target.uuid().to_owned());
        }
        Ok(moved)
    }

    /// Moves `target` from writers to readers. Returns whether a move
    /// happened.
    pub fn demote(&mut self, granter: &Pkr, target: &Pkr) -> Result<bool, AccessError> {
        self.require_grant(granter, "demote to reader")?;
        let moved = self.writers.remove(target.uuid());
        if moved {
            self.readers.insert(target.uuid().to_owned());
        }
        Ok(moved)
    }

    /// Reader uuids, sorted, as a defensive copy.
    #[must_use]
    pub fn readers(&self) -> Vec<String> {
        let mut out: Vec<String> = self.readers.iter().cloned().collect();
        out.sort_unstable();
        out
    }

    /// Writer uuids, sorted, as a defensive copy.
    #[must_use]
    pub fn writers(&self) -> Vec<String> {
        let mut out: Vec<String> = self.writers.iter().cloned().collect();
        out.sort_unstable();
        out
    }

    /// Independent copy sharing the owner PKR and registry reference.
    #[must_use]
    pub fn clone_set(&self) -> Self {
        self.clone()
    }
}
