// SPDX-License-Identifier: Apache-2.0

//! Principals: the internal owners of PKRs.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::handle::KeyHandle;
use crate::pkr::Pkr;

/// A kind string did not name a principal kind.
#[derive(Debug, Error)]
#[error("unknown principal kind: {0}")]
pub struct UnknownKindError(pub String);

/// The five principal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    /// The singleton principal empowered to send protected messages and
    /// bypass access checks.
    Kernel,
    /// A top-level application principal.
    TopLevel,
    /// A principal owned by another principal.
    Child,
    /// A trusted external peer.
    Friend,
    /// A passive resource principal.
    Resource,
}

impl PrincipalKind {
    /// Canonical string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::TopLevel => "topLevel",
            Self::Child => "child",
            Self::Friend => "friend",
            Self::Resource => "resource",
        }
    }

    /// Whether principals of this kind hold a private key.
    #[must_use]
    pub fn has_private_key(self) -> bool {
        matches!(self, Self::Kernel | Self::TopLevel | Self::Friend)
    }

    /// Whether principals of this kind record an owner link.
    #[must_use]
    pub fn has_owner(self) -> bool {
        matches!(self, Self::Child | Self::Resource)
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kernel" => Ok(Self::Kernel),
            "topLevel" => Ok(Self::TopLevel),
            "child" => Ok(Self::Child),
            "friend" => Ok(Self::Friend),
            "resource" => Ok(Self::Resource),
            other => Err(UnknownKindError(other.to_owned())),
        }
    }
}

/// Opaque instance payload attached to a principal.
pub type InstanceHandle = Arc<dyn Any + Send + Sync>;

/// A registered principal and its current key material.
#[derive(Clone)]
pub struct Principal {
    pub(crate) uuid: String,
    pub(crate) kind: PrincipalKind,
    pub(crate) name: Option<String>,
    pub(crate) metadata: Value,
    pub(crate) public_key: KeyHandle,
    pub(crate) private_key: Option<KeyHandle>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) instance: Option<InstanceHandle>,
    pub(crate) owner: Option<String>,
    pub(crate) pkr: Pkr,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("uuid", &self.uuid)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("public_key", &self.public_key)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Principal {
    /// The principal's uuid.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The principal's kind.
    #[must_use]
    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// Optional display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Caller-supplied metadata.
    #[must_use]
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Current public key handle.
    #[must_use]
    pub fn public_key(&self) -> KeyHandle {
        self.public_key
    }

    /// Current private key handle, for entitled kinds.
    #[must_use]
    pub fn private_key(&self) -> Option<KeyHandle> {
        self.private_key
    }

    /// Creation instant.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Opaque instance payload, if any.
    #[must_use]
    pub fn instance(&self) -> Option<&InstanceHandle> {
        self.instance.as_ref()
    }

    /// Owning principal's uuid, recorded for child and resource kinds.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// The principal's current PKR.
    #[must_use]
    pub fn pkr(&self) -> &Pkr {
        &self.pkr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_round_trip() {
        for kind in [
            PrincipalKind::Kernel,
            PrincipalKind::TopLevel,
            PrincipalKind::Child,
            PrincipalKind::Friend,
            PrincipalKind::Resource,
        ] {
            let parsed: Result<PrincipalKind, _> = kind.as_str().parse();
            assert!(matches!(parsed, Ok(k) if k == kind));
        }
        assert!("overlord".parse::<PrincipalKind>().is_err());
    }

    #[test]
    fn private_key_entitlement_matches_kinds() {
        assert!(PrincipalKind::Kernel.has_private_key());
        assert!(PrincipalKind::TopLevel.has_private_key());
        assert!(PrincipalKind::Friend.has_private_key());
        assert!(!PrincipalKind::Child.has_private_key());
        assert!(!PrincipalKind::Resource.has_private_key());
    }

    #[test]
    fn owner_links_are_for_child_and_resource() {
        assert!(PrincipalKind::Child.has_owner());
        assert!(PrincipalKind::Resource.has_owner());
        assert!(!PrincipalKind::Kernel.has_owner());
        assert!(!PrincipalKind::TopLevel.has_owner());
        assert!(!PrincipalKind::Friend.has_owner());
    }
}
