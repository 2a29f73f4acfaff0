// SPDX-License-Identifier: Apache-2.0

//! Identity wrappers: permission-guarded invocation and protected sends.
//!
//! An identity binds a principal to its reader/writer set and the registry.
//! The `require_*` family invokes a caller-supplied closure only when the
//! capability check passes; protected sends forward to the kernel transport
//! under the identity's current PKR.

use std::fmt;

use weft_core::SharedMessage;

use crate::pkr::Pkr;
use crate::registry::{Lookup, PrincipalRegistry, RegistryError, SendOptions};
use crate::rws::{AccessError, AccessKind, SharedRws};

/// Permission-wrapped handle to one principal.
#[derive(Clone)]
pub struct Identity {
    uuid: String,
    registry: PrincipalRegistry,
    rws: SharedRws,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("uuid", &self.uuid)
            .finish_non_exhaustive()
    }
}

impl Identity {
    pub(crate) fn new(uuid: String, registry: PrincipalRegistry, rws: SharedRws) -> Self {
        Self {
            uuid,
            registry,
            rws,
        }
    }

    /// Uuid of the wrapped principal.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The principal's current PKR, read from the registry so refreshes are
    /// always observed.
    pub fn pkr(&self) -> Result<Pkr, RegistryError> {
        self.registry
            .get(Lookup::Uuid(&self.uuid))
            .map(|p| p.pkr().clone())
    }

    /// The underlying reader/writer set.
    #[must_use]
    pub fn rws(&self) -> &SharedRws {
        &self.rws
    }

    /// Whether `pkr` may read.
    #[must_use]
    pub fn can_read(&self, pkr: &Pkr) -> bool {
        self.rws.read().can_read(pkr)
    }

    /// Whether `pkr` may write.
    #[must_use]
    pub fn can_write(&self, pkr: &Pkr) -> bool {
        self.rws.read().can_write(pkr)
    }

    /// Whether `pkr` may grant.
    #[must_use]
    pub fn can_grant(&self, pkr: &Pkr) -> bool {
        self.rws.read().can_grant(pkr)
    }

    /// Invokes `action` when `pkr` holds the capability; otherwise refuses.
    pub fn require_auth<R>(
        &self,
        kind: AccessKind,
        pkr: &Pkr,
        action: impl FnOnce() -> R,
    ) -> Result<R, AccessError> {
        if self.rws.read().can(kind, pkr) {
            Ok(action())
        } else {
            Err(AccessError::Unauthorized {
                who: pkr.uuid().to_owned(),
                action: kind.to_string(),
            })
        }
    }

    /// Invokes `action` when `pkr` may read.
    pub fn require_read<R>(&self, pkr: &Pkr, action: impl FnOnce() -> R) -> Result<R, AccessError> {
        self.require_auth(AccessKind::Read, pkr, action)
    }

    /// Invokes `action` when `pkr` may write.
    pub fn require_write<R>(&self, pkr: &Pkr, action: impl FnOnce() -> R) -> Result<R, AccessError> {
        self.require_auth(AccessKind::Write, pkr, action)
    }

    /// Invokes `action` when `pkr` may grant.
    pub fn require_grant<R>(&self, pkr: &Pkr, action: impl FnOnce() -> R) -> Result<R, AccessError> {
        self.require_auth(AccessKind::Grant, pkr, action)
    }

    /// Grants `target` read access, acting as this identity.
    pub fn grant_reader(&self, target: &Pkr) -> Result<(), AccessError> {
        let own = self.pkr()?;
        self.rws.write().add_reader(&own, target)
    }

    /// Revokes `target`'s read access, acting as this identity.
    pub fn revoke_reader(&self, target: &Pkr) -> Result<(), AccessError> {
        let own = self.pkr()?;
        self.rws.write().remove_reader(&own, target)
    }

    /// Grants `target` write access, acting as this identity.
    pub fn grant_writer(&self, target: &Pkr) -> Result<(), AccessError> {
        let own = self.pkr()?;
        self.rws.write().add_writer(&own, target)
    }

    /// Revokes `target`'s write access, acting as this identity.
    pub fn revoke_writer(&self, target: &Pkr) -> Result<(), AccessError> {
        let own = self.pkr()?;
        self.rws.write().remove_writer(&own, target)
    }

    /// Promotes `target` from reader to writer, acting as this identity.
    pub fn promote(&self, target: &Pkr) -> Result<bool, AccessError> {
        let own = self.pkr()?;
        self.rws.write().promote(&own, target)
    }

    /// Demotes `target` from writer to reader, acting as this identity.
    pub fn demote(&self, target: &Pkr) -> Result<bool, AccessError> {
        let own = self.pkr()?;
        self.rws.write().demote(&own, target)
    }

    /// Sends a message through the kernel transport under this identity's
    /// PKR. Fails when the kernel principal is gone.
    pub fn send_protected(
        &self,
        msg: SharedMessage,
        opts: &SendOptions,
    ) -> Result<(), AccessError> {
        let kernel = self
            .registry
            .kernel_transport()
            .ok_or(AccessError::KernelAbsent)?;
        let pkr = self.pkr()?;
        kernel.send_protected(&pkr, msg, opts)?;
        Ok(())
    }
}
