// SPDX-License-Identifier: Apache-2.0

//! Processor facet hook.
//!
//! The processor needs the router and queue components, so construction
//! happens in `on_init` — by then the plan guarantees both dependencies are
//! initialized. The four contract methods (`accept`, `processMessage`,
//! `processTick`, `processImmediately`) are installed alongside the typed
//! `state` handle; the contract enforcer checks for them at build time.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::facet::{Facet, FacetError, MethodCall, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::processor::Processor;
use crate::queries::QueryRegistry;
use crate::queue::{EnqueueOutcome, MessageQueue};
use crate::router::Router;
use crate::stats::{StatsHandle, StatsRegistry};

use super::{optional_state, required_state, DEFAULT_SOURCE};

fn outcome_label(outcome: EnqueueOutcome) -> &'static str {
    match outcome {
        EnqueueOutcome::Enqueued => "enqueued",
        EnqueueOutcome::DroppedNew => "dropped",
        EnqueueOutcome::Evicted => "evicted",
    }
}

fn message_of(call: MethodCall, method: &str) -> Result<crate::message::SharedMessage, FacetError> {
    call.message
        .ok_or_else(|| FacetError::invalid(format!("'{method}' requires a message")))
}

fn method_failed(name: &str, err: impl std::fmt::Display) -> FacetError {
    FacetError::MethodFailed {
        name: name.to_owned(),
        reason: err.to_string(),
    }
}

/// Produces the processor facet, wiring router → queue → observers.
#[must_use]
pub fn processor_hook() -> Hook {
    let meta = HookMeta::new(kinds::PROCESSOR)
        .required([kinds::ROUTER, kinds::QUEUE])
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |_args| {
        let mut facet = Facet::from_meta(&meta)?;
        let _ = facet.on_init(|facet, init| {
            let router = required_state::<Router>(init.manager, kinds::ROUTER)?;
            let queue = required_state::<MessageQueue>(init.manager, kinds::QUEUE)?;
            let stats = optional_state::<StatsRegistry>(init.manager, kinds::STATISTICS)
                .map(|s| s as StatsHandle);
            let queries = optional_state::<QueryRegistry>(init.manager, kinds::QUERIES);
            let processor = Arc::new(Processor::with_observers(router, queue, stats, queries));

            facet.add_handle(STATE_MEMBER, processor.clone())?;

            let accept = processor.clone();
            facet.add_method("accept", move |call| {
                let msg = message_of(call, "accept")?;
                accept
                    .accept(msg)
                    .map(|outcome| json!(outcome_label(outcome)))
                    .map_err(|err| method_failed("accept", err))
            })?;

            let per_message = processor.clone();
            facet.add_method("processMessage", move |call| {
                let msg = message_of(call, "processMessage")?;
                per_message
                    .process_message(&msg)
                    .map(|reply| reply.unwrap_or(Value::Null))
                    .map_err(|err| method_failed("processMessage", err))
            })?;

            let tick = processor.clone();
            facet.add_method("processTick", move |_call| {
                let report = tick.process_tick();
                Ok(json!({
                    "processed": report.processed,
                    "errors": report.errors,
                }))
            })?;

            let immediate = processor;
            facet.add_method("processImmediately", move |call| {
                let msg = message_of(call, "processImmediately")?;
                immediate
                    .process_immediately(&msg)
                    .map(|reply| reply.unwrap_or(Value::Null))
                    .map_err(|err| method_failed("processImmediately", err))
            })?;
            Ok(())
        })?;
        Ok(facet)
    })
}
