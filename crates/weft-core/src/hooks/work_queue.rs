// SPDX-License-Identifier: Apache-2.0

//! Queue facet hook.

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::facet::{Facet, FacetError, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::queue::MessageQueue;
use crate::stats::{StatsHandle, StatsRegistry};

use super::{optional_state, DEFAULT_SOURCE};

/// Produces the queue facet: a [`MessageQueue`] configured from
/// `config.queue`, wired to the statistics facet when one is installed.
///
/// Statistics is a soft dependency: the queue works without it, so its
/// absence must not fail the plan.
#[must_use]
pub fn queue_hook() -> Hook {
    let meta = HookMeta::new(kinds::QUEUE)
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |args| {
        let config: QueueConfig = args
            .ctx
            .facet_config(kinds::QUEUE)
            .map_err(|err| FacetError::invalid(err.to_string()))?;
        let queue = Arc::new(MessageQueue::with_config(&config));

        let mut facet = Facet::from_meta(&meta)?;
        facet.add_handle(STATE_MEMBER, queue.clone())?;
        let _ = facet.on_init(move |_facet, init| {
            if let Some(stats) = optional_state::<StatsRegistry>(init.manager, kinds::STATISTICS) {
                queue.set_stats(stats as StatsHandle);
            }
            Ok(())
        })?;
        Ok(facet)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Ctx;
    use crate::hook::HookArgs;
    use serde_json::json;

    #[test]
    fn produces_a_configured_queue() {
        let ctx = Ctx::from_value(json!({
            "config": {"queue": {"capacity": 3}}
        }));
        let args = HookArgs {
            ctx: &ctx,
            subsystem: "test",
        };
        let Ok(facet) = queue_hook().invoke(&args) else {
            unreachable!("queue hook must materialize")
        };
        let Some(queue) = facet.state::<MessageQueue>() else {
            unreachable!("queue state must be present")
        };
        assert_eq!(queue.capacity(), 3);
    }
}
