// SPDX-License-Identifier: Apache-2.0

//! Hierarchy facet hook.

use std::sync::Arc;

use crate::facet::{Facet, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::subsystem::ChildRegistry;

use super::DEFAULT_SOURCE;

/// Produces the hierarchy facet: a [`ChildRegistry`] whose children are
/// collected and built with the parent subsystem.
#[must_use]
pub fn hierarchy_hook() -> Hook {
    let meta = HookMeta::new(kinds::HIERARCHY)
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |_args| {
        let mut facet = Facet::from_meta(&meta)?;
        facet.add_handle(STATE_MEMBER, Arc::new(ChildRegistry::new()))?;
        Ok(facet)
    })
}
