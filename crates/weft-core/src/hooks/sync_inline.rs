// SPDX-License-Identifier: Apache-2.0

//! Synchronous facet hook.
//!
//! Installed by the synchronous default set in place of the scheduler. The
//! facet exposes the processor's queue-bypassing path so callers process
//! messages inline instead of waiting for a drain slice.

use serde_json::Value;

use crate::facet::{Facet, FacetError, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::processor::Processor;

use super::{required_state, DEFAULT_SOURCE};

/// Produces the synchronous facet, delegating to the processor's immediate
/// path.
#[must_use]
pub fn synchronous_hook() -> Hook {
    let meta = HookMeta::new(kinds::SYNCHRONOUS)
        .required([kinds::PROCESSOR])
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |_args| {
        let mut facet = Facet::from_meta(&meta)?;
        let _ = facet.on_init(|facet, init| {
            let processor = required_state::<Processor>(init.manager, kinds::PROCESSOR)?;
            facet.add_handle(STATE_MEMBER, processor.clone())?;

            facet.add_method("process", move |call| {
                let msg = call
                    .message
                    .ok_or_else(|| FacetError::invalid("'process' requires a message"))?;
                processor
                    .process_immediately(&msg)
                    .map(|reply| reply.unwrap_or(Value::Null))
                    .map_err(|err| FacetError::MethodFailed {
                        name: "process".to_owned(),
                        reason: err.to_string(),
                    })
            })?;
            Ok(())
        })?;
        Ok(facet)
    })
}
