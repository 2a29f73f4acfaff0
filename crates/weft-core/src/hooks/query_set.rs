// SPDX-License-Identifier: Apache-2.0

//! Queries facet hook.

use std::sync::Arc;

use crate::facet::{Facet, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::queries::QueryRegistry;

use super::DEFAULT_SOURCE;

/// Produces the queries facet: a [`QueryRegistry`] the processor reports
/// issued and answered queries to.
#[must_use]
pub fn queries_hook() -> Hook {
    let meta = HookMeta::new(kinds::QUERIES)
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |_args| {
        let mut facet = Facet::from_meta(&meta)?;
        facet.add_handle(STATE_MEMBER, Arc::new(QueryRegistry::new()))?;
        Ok(facet)
    })
}
