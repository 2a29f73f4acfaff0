// SPDX-License-Identifier: Apache-2.0

//! Principal registry: key minting, principal records, refresh, and the
//! wiring of reader/writer sets and identities.
//!
//! The registry is a cloneable handle over shared state. Construction takes
//! the kernel transport and immediately creates the kernel principal; at
//! most one kernel exists per registry.
//!
//! Refresh is serialized per principal: the registry hands out one lock
//! token per uuid, re-checks expiry under the token, and swaps key indexes
//! atomically. After a refresh the old public key resolves to nothing.

use core::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use weft_core::SharedMessage;

use crate::handle::{KeyHandle, KeyPair};
use crate::identity::Identity;
use crate::pkr::{Pkr, PkrError, PkrSpec};
use crate::principal::{InstanceHandle, Principal, PrincipalKind};
use crate::rws::{ReaderWriterSet, SharedRws};

/// A protected send failed in the kernel transport.
#[derive(Debug, Error)]
#[error("protected send failed: {reason}")]
pub struct SendError {
    /// Transport-supplied reason.
    pub reason: String,
}

impl SendError {
    /// Creates a send error with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Options for a protected send.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Delivery priority.
    pub priority: u32,
    /// Whether the message must not be interleaved with others.
    pub atomic: bool,
}

/// Kernel transport contract. External collaborator: only the shape is
/// specified here.
pub trait Kernel: Send + Sync {
    /// Sends `msg` on behalf of the principal identified by `pkr`.
    fn send_protected(
        &self,
        pkr: &Pkr,
        msg: SharedMessage,
        opts: &SendOptions,
    ) -> Result<(), SendError>;
}

/// Ctx resource key the kernel transport is expected under.
pub const KERNEL_RESOURCE: &str = "principals.kernel";

/// Concrete wrapper letting the kernel transport ride a subsystem ctx
/// resource slot (trait objects cannot be downcast directly).
pub struct KernelSlot(pub Arc<dyn Kernel>);

impl fmt::Debug for KernelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KernelSlot(..)")
    }
}

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A second kernel principal was requested.
    #[error("kernel principal already exists")]
    DuplicateKernel,
    /// A principal with the same name already exists.
    #[error("duplicate principal name '{name}'")]
    DuplicateName {
        /// The colliding name.
        name: String,
    },
    /// No principal matches the lookup.
    #[error("unknown principal: {lookup}")]
    UnknownPrincipal {
        /// Human-readable description of the failed lookup.
        lookup: String,
    },
    /// A PKR refers to a public key the registry does not know.
    #[error("unknown PKR: public key {key} is not registered")]
    UnknownPkr {
        /// The unknown public key handle.
        key: KeyHandle,
    },
    /// A friend-only operation was attempted on another kind.
    #[error("invalid principal kind: expected friend, found {found}")]
    NotFriend {
        /// The actual kind.
        found: PrincipalKind,
    },
    /// No kernel transport was found where one is required.
    #[error("kernel transport missing: ctx resource '{KERNEL_RESOURCE}' is required")]
    KernelMissing,
    /// PKR construction failed.
    #[error(transparent)]
    Pkr(#[from] PkrError),
}

/// Lookup selector accepted by [`PrincipalRegistry::get`] and
/// [`PrincipalRegistry::has`].
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// By principal uuid.
    Uuid(&'a str),
    /// By display name.
    Name(&'a str),
    /// By public key handle.
    PublicKey(KeyHandle),
    /// By private key handle.
    PrivateKey(KeyHandle),
}

impl fmt::Display for Lookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(uuid) => write!(f, "uuid '{uuid}'"),
            Self::Name(name) => write!(f, "name '{name}'"),
            Self::PublicKey(key) => write!(f, "public {key}"),
            Self::PrivateKey(key) => write!(f, "private {key}"),
        }
    }
}

/// Options for [`PrincipalRegistry::create_principal`].
#[derive(Default)]
pub struct CreatePrincipal {
    /// Optional unique display name.
    pub name: Option<String>,
    /// Caller-supplied metadata.
    pub metadata: serde_json::Value,
    /// Opaque instance payload.
    pub instance: Option<InstanceHandle>,
    /// Owning principal's uuid; recorded for child and resource kinds.
    pub owner: Option<String>,
    /// Expiration phrase for the minted PKR; defaults to one week.
    pub expiration: Option<String>,
}

impl fmt::Debug for CreatePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatePrincipal")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

struct Inner {
    kernel: Arc<dyn Kernel>,
    kernel_id: Option<String>,
    principals: FxHashMap<String, Principal>,
    by_name: FxHashMap<String, String>,
    by_public: FxHashMap<KeyHandle, String>,
    by_private: FxHashMap<KeyHandle, String>,
    rws_cache: FxHashMap<String, SharedRws>,
    refresh_locks: FxHashMap<String, Arc<Mutex<()>>>,
}

/// Cloneable handle to the shared principal registry.
#[derive(Clone)]
pub struct PrincipalRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl fmt::Debug for PrincipalRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("PrincipalRegistry")
            .field("principals", &inner.principals.len())
            .field("kernel_id", &inner.kernel_id)
            .finish_non_exhaustive()
    }
}

impl PrincipalRegistry {
    /// Creates a registry over the kernel transport and mints the kernel
    /// principal.
    pub fn new(kernel: Arc<dyn Kernel>) -> Result<Self, RegistryError> {
        let registry = Self {
            inner: Arc::new(RwLock::new(Inner {
                kernel,
                kernel_id: None,
                principals: FxHashMap::default(),
                by_name: FxHashMap::default(),
                by_public: FxHashMap::default(),
                by_private: FxHashMap::default(),
                rws_cache: FxHashMap::default(),
                refresh_locks: FxHashMap::default(),
            })),
        };
        let _ = registry.create_principal(
            PrincipalKind::Kernel,
            CreatePrincipal {
                name: Some("kernel".to_owned()),
                ..CreatePrincipal::default()
            },
        )?;
        Ok(registry)
    }

    /// Creates a registry from the kernel transport stored on a subsystem
    /// ctx under [`KERNEL_RESOURCE`].
    pub fn from_ctx(ctx: &weft_core::Ctx) -> Result<Self, RegistryError> {
        let slot = ctx
            .resource::<KernelSlot>(KERNEL_RESOURCE)
            .ok_or(RegistryError::KernelMissing)?;
        Self::new(slot.0.clone())
    }

    /// Mints a fresh key pair; the private half only for entitled kinds.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn mint(&self, kind: PrincipalKind) -> KeyPair {
        KeyPair {
            public: KeyHandle::mint(),
            private: kind.has_private_key().then(KeyHandle::mint),
        }
    }

    /// Creates a principal of the given kind and returns its fresh PKR.
    ///
    /// At most one kernel may exist; display names are unique; key handles
    /// are unique by construction.
    pub fn create_principal(
        &self,
        kind: PrincipalKind,
        opts: CreatePrincipal,
    ) -> Result<Pkr, RegistryError> {
        let keys = self.mint(kind);
        let mut inner = self.inner.write();

        if kind == PrincipalKind::Kernel && inner.kernel_id.is_some() {
            return Err(RegistryError::DuplicateKernel);
        }
        if let Some(name) = &opts.name {
            if inner.by_name.contains_key(name) {
                return Err(RegistryError::DuplicateName { name: name.clone() });
            }
        }

        let mut uuid = Uuid::new_v4().to_string();
        while inner.principals.contains_key(&uuid) {
            uuid = Uuid::new_v4().to_string();
        }

        let minter = if kind == PrincipalKind::Kernel {
            keys.public
        } else {
            let kernel_uuid = inner.kernel_id.as_deref().unwrap_or_default();
            inner
                .principals
                .get(kernel_uuid)
                .map(Principal::public_key)
                .unwrap_or(keys.public)
        };

        let pkr = Pkr::from_spec(PkrSpec {
            uuid: uuid.clone(),
            name: opts.name.clone(),
            kind,
            public_key: keys.public,
            minter: Some(minter),
            expiration: opts.expiration,
        })?;

        let principal = Principal {
            uuid: uuid.clone(),
            kind,
            name: opts.name.clone(),
            metadata: opts.metadata,
            public_key: keys.public,
            private_key: keys.private,
            created_at: chrono::Utc::now(),
            instance: opts.instance,
            owner: kind.has_owner().then_some(opts.owner).flatten(),
            pkr: pkr.clone(),
        };

        if let Some(name) = &opts.name {
            inner.by_name.insert(name.clone(), uuid.clone());
        }
        inner.by_public.insert(keys.public, uuid.clone());
        if let Some(private) = keys.private {
            inner.by_private.insert(private, uuid.clone());
        }
        if kind == PrincipalKind::Kernel {
            inner.kernel_id = Some(uuid.clone());
        }
        inner.principals.insert(uuid.clone(), principal);
        debug!(uuid = %uuid, kind = %kind, "principal created");
        Ok(pkr)
    }

    /// Returns the private key behind a PKR's public key, if the registry
    /// knows it.
    #[must_use]
    pub fn resolve_pkr(&self, pkr: &Pkr) -> Option<KeyHandle> {
        let inner = self.inner.read();
        let uuid = inner.by_public.get(&pkr.public_key())?;
        inner.principals.get(uuid).and_then(Principal::private_key)
    }

    /// Looks a principal up by uuid, name, or key handle.
    pub fn get(&self, lookup: Lookup<'_>) -> Result<Principal, RegistryError> {
        let inner = self.inner.read();
        let uuid = match lookup {
            Lookup::Uuid(uuid) => Some(uuid.to_owned()),
            Lookup::Name(name) => inner.by_name.get(name).cloned(),
            Lookup::PublicKey(key) => inner.by_public.get(&key).cloned(),
            Lookup::PrivateKey(key) => inner.by_private.get(&key).cloned(),
        };
        uuid.and_then(|uuid| inner.principals.get(&uuid).cloned())
            .ok_or_else(|| RegistryError::UnknownPrincipal {
                lookup: lookup.to_string(),
            })
    }

    /// Whether any principal matches the lookup.
    #[must_use]
    pub fn has(&self, lookup: Lookup<'_>) -> bool {
        self.get(lookup).is_ok()
    }

    /// Refreshes a principal whose PKR has expired, returning the new PKR.
    ///
    /// Unexpired principals are returned unchanged. Refresh is guarded by a
    /// per-principal lock; a racing refresh observes the winner's fresh PKR
    /// and returns it untouched. After a successful refresh the old public
    /// key no longer resolves.
    pub fn refresh_principal(&self, uuid: &str) -> Result<Pkr, RegistryError> {
        let current = self.get(Lookup::Uuid(uuid))?;
        if !current.pkr().is_expired() {
            return Ok(current.pkr().clone());
        }

        let token = {
            let mut inner = self.inner.write();
            inner
                .refresh_locks
                .entry(uuid.to_owned())
                .or_default()
                .clone()
        };
        let _guard = token.lock();

        // Re-check under the lock: a concurrent refresh may have won.
        let current = self.get(Lookup::Uuid(uuid))?;
        if !current.pkr().is_expired() {
            return Ok(current.pkr().clone());
        }

        let keys = self.mint(current.kind());
        let mut inner = self.inner.write();
        let kernel_key = inner
            .kernel_id
            .as_deref()
            .and_then(|id| inner.principals.get(id))
            .map(Principal::public_key);

        let Some(principal) = inner.principals.get(uuid) else {
            return Err(RegistryError::UnknownPrincipal {
                lookup: format!("uuid '{uuid}'"),
            });
        };
        let old_public = principal.public_key;
        let old_private = principal.private_key;

        let pkr = Pkr::from_spec(PkrSpec {
            uuid: uuid.to_owned(),
            name: principal.name.clone(),
            kind: principal.kind,
            public_key: keys.public,
            minter: kernel_key.or(Some(keys.public)),
            expiration: None,
        })?;

        inner.by_public.remove(&old_public);
        if let Some(old_private) = old_private {
            inner.by_private.remove(&old_private);
        }
        inner.by_public.insert(keys.public, uuid.to_owned());
        if let Some(private) = keys.private {
            inner.by_private.insert(private, uuid.to_owned());
        }
        if let Some(principal) = inner.principals.get_mut(uuid) {
            principal.public_key = keys.public;
            principal.private_key = keys.private;
            principal.pkr = pkr.clone();
        }
        debug!(uuid, "principal refreshed");
        Ok(pkr)
    }

    /// Returns the per-principal reader/writer set, creating and caching it
    /// on first use.
    pub fn create_rws(&self, pkr: &Pkr) -> Result<SharedRws, RegistryError> {
        self.require_known(pkr)?;
        let mut inner = self.inner.write();
        if let Some(existing) = inner.rws_cache.get(pkr.uuid()) {
            return Ok(existing.clone());
        }
        let rws: SharedRws = Arc::new(RwLock::new(ReaderWriterSet::new(
            pkr.clone(),
            self.clone(),
        )));
        inner.rws_cache.insert(pkr.uuid().to_owned(), rws.clone());
        Ok(rws)
    }

    /// Creates an identity wrapper for the principal behind `pkr`.
    pub fn create_identity(&self, pkr: &Pkr) -> Result<Identity, RegistryError> {
        self.require_known(pkr)?;
        let rws = self.create_rws(pkr)?;
        Ok(Identity::new(pkr.uuid().to_owned(), self.clone(), rws))
    }

    /// Creates an identity wrapper for a friend principal; any other kind is
    /// rejected.
    pub fn create_friend_identity(&self, pkr: &Pkr) -> Result<Identity, RegistryError> {
        let principal = self.get(Lookup::Uuid(pkr.uuid()))?;
        if principal.kind() != PrincipalKind::Friend {
            return Err(RegistryError::NotFriend {
                found: principal.kind(),
            });
        }
        self.create_identity(pkr)
    }

    fn require_known(&self, pkr: &Pkr) -> Result<(), RegistryError> {
        let inner = self.inner.read();
        if inner.principals.contains_key(pkr.uuid()) {
            Ok(())
        } else {
            Err(RegistryError::UnknownPkr {
                key: pkr.public_key(),
            })
        }
    }

    /// Removes a principal and every mapping to it. Deleting the kernel
    /// clears the kernel id and disables protected sends.
    pub fn delete(&self, uuid: &str) -> Result<Principal, RegistryError> {
        let mut inner = self.inner.write();
        let Some(principal) = inner.principals.remove(uuid) else {
            return Err(RegistryError::UnknownPrincipal {
                lookup: format!("uuid '{uuid}'"),
            });
        };
        if let Some(name) = principal.name() {
            let name = name.to_owned();
            inner.by_name.remove(&name);
        }
        inner.by_public.remove(&principal.public_key);
        if let Some(private) = principal.private_key {
            inner.by_private.remove(&private);
        }
        inner.rws_cache.remove(uuid);
        inner.refresh_locks.remove(uuid);
        if inner.kernel_id.as_deref() == Some(uuid) {
            inner.kernel_id = None;
        }
        Ok(principal)
    }

    /// Removes every principal, mapping, and cached reader/writer set.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.principals.clear();
        inner.by_name.clear();
        inner.by_public.clear();
        inner.by_private.clear();
        inner.rws_cache.clear();
        inner.refresh_locks.clear();
        inner.kernel_id = None;
    }

    /// Number of registered principals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().principals.len()
    }

    /// Whether no principals are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().principals.is_empty()
    }

    /// Whether `pkr` refers to the kernel principal.
    #[must_use]
    pub fn is_kernel(&self, pkr: &Pkr) -> bool {
        self.inner.read().kernel_id.as_deref() == Some(pkr.uuid())
    }

    /// The kernel principal's current PKR, while one exists.
    #[must_use]
    pub fn kernel_pkr(&self) -> Option<Pkr> {
        let inner = self.inner.read();
        let uuid = inner.kernel_id.as_deref()?;
        inner.principals.get(uuid).map(|p| p.pkr().clone())
    }

    /// The kernel transport, while the kernel principal exists.
    #[must_use]
    pub fn kernel_transport(&self) -> Option<Arc<dyn Kernel>> {
        let inner = self.inner.read();
        inner.kernel_id.as_ref()?;
        Some(inner.kernel.clone())
    }
}
