// SPDX-License-Identifier: Apache-2.0

//! Statistics facet hook.

use std::sync::Arc;

use serde_json::Value;

use crate::facet::{Facet, FacetError, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::stats::StatsRegistry;

use super::DEFAULT_SOURCE;

/// Produces the statistics facet: a counter [`StatsRegistry`] observing
/// enqueue, dequeue, time-slice, route, and error events.
#[must_use]
pub fn statistics_hook() -> Hook {
    let meta = HookMeta::new(kinds::STATISTICS)
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |_args| {
        let stats = Arc::new(StatsRegistry::new());

        let mut facet = Facet::from_meta(&meta)?;
        facet.add_handle(STATE_MEMBER, stats.clone())?;
        let snapshot_stats = stats.clone();
        facet.add_method("snapshot", move |_call| {
            serde_json::to_value(snapshot_stats.snapshot()).map_err(|err| {
                FacetError::MethodFailed {
                    name: "snapshot".to_owned(),
                    reason: err.to_string(),
                }
            })
        })?;
        let reset_stats = stats;
        facet.add_method("reset", move |_call| {
            reset_stats.reset();
            Ok(Value::Null)
        })?;
        Ok(facet)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Ctx;
    use crate::facet::MethodCall;
    use crate::hook::HookArgs;
    use crate::stats::STAT_ROUTED;

    #[test]
    fn snapshot_method_reports_counters() {
        let ctx = Ctx::new();
        let args = HookArgs {
            ctx: &ctx,
            subsystem: "test",
        };
        let Ok(facet) = statistics_hook().invoke(&args) else {
            unreachable!("statistics hook must materialize")
        };
        let Some(stats) = facet.state::<StatsRegistry>() else {
            unreachable!("statistics state must be present")
        };
        stats.increment(STAT_ROUTED);

        let snapshot = facet.call("snapshot", MethodCall::empty());
        assert!(matches!(snapshot, Ok(v) if v[STAT_ROUTED] == 1));
    }
}
