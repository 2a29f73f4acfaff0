// SPDX-License-Identifier: Apache-2.0

//! Router facet hook.

use std::sync::Arc;

use crate::config::RouterConfig;
use crate::facet::{Facet, FacetError, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::router::Router;

use super::DEFAULT_SOURCE;

/// Produces the router facet: a [`Router`] configured from `config.router`.
#[must_use]
pub fn router_hook() -> Hook {
    let meta = HookMeta::new(kinds::ROUTER)
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |args| {
        let config: RouterConfig = args
            .ctx
            .facet_config(kinds::ROUTER)
            .map_err(|err| FacetError::invalid(err.to_string()))?;
        let router = Arc::new(Router::with_config(&config));

        let mut facet = Facet::from_meta(&meta)?;
        facet.add_handle(STATE_MEMBER, router)?;
        Ok(facet)
    })
}
