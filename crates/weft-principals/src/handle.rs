// SPDX-License-Identifier: Apache-2.0

//! Opaque key handles.
//!
//! Public and private keys are identity-only tokens: process-unique `u64`
//! values from a monotonic allocator, never derived from key material.
//! Equality is identity; uniqueness within the process is the whole
//! security property.
//!
//! # Invariants
//! - Zero is reserved as invalid; the allocator starts at `1`.
//! - Handles are never reused within a process.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique key token.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct KeyHandle(u64);

impl KeyHandle {
    /// Allocates a fresh, never-before-seen handle.
    #[must_use]
    pub fn mint() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether the handle is valid (non-zero).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl core::fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "key#{}", self.0)
    }
}

/// A freshly minted key pair. The private half is present only for kinds
/// entitled to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    /// Public half; always present.
    pub public: KeyHandle,
    /// Private half; present for kernel, top-level, and friend principals.
    pub private: Option<KeyHandle>,
}
