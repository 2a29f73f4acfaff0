// SPDX-License-Identifier: Apache-2.0

//! Listeners facet hook.

use std::sync::Arc;

use crate::facet::{Facet, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::listeners::ListenerRegistry;

use super::DEFAULT_SOURCE;

/// Produces the listeners facet: a [`ListenerRegistry`] for lifecycle and
/// user events.
#[must_use]
pub fn listeners_hook() -> Hook {
    let meta = HookMeta::new(kinds::LISTENERS)
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |_args| {
        let mut facet = Facet::from_meta(&meta)?;
        facet.add_handle(STATE_MEMBER, Arc::new(ListenerRegistry::new()))?;
        Ok(facet)
    })
}
