// SPDX-License-Identifier: Apache-2.0
//! weft-principals: the weft security core.
//!
//! Principal-based authorization over opaque key handles: a registry mints
//! and refreshes Public Key Records, reader/writer sets enforce the
//! `grant ⇒ write ⇒ read` capability lattice per resource, and identity
//! wrappers gate handler invocation and protected messaging through the
//! kernel transport. No real cryptography — keys are identity-only tokens,
//! unforgeable within the process.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod handle;
mod identity;
mod pkr;
mod principal;
mod registry;
mod rws;

// Re-exports for stable public API
/// Opaque key handles and freshly minted pairs.
pub use handle::{KeyHandle, KeyPair};
/// Permission-wrapped principal handles.
pub use identity::Identity;
/// Public Key Records and their construction.
pub use pkr::{Pkr, PkrError, PkrSpec};
/// Principal records and kinds.
pub use principal::{InstanceHandle, Principal, PrincipalKind, UnknownKindError};
/// The principal registry, kernel transport contract, and lookups.
pub use registry::{
    CreatePrincipal, Kernel, KernelSlot, Lookup, PrincipalRegistry, RegistryError, SendError,
    SendOptions, KERNEL_RESOURCE,
};
/// Reader/writer sets and access errors.
pub use rws::{AccessError, AccessKind, ReaderWriterSet, SharedRws};
