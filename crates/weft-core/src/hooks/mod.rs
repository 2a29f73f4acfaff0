// SPDX-License-Identifier: Apache-2.0

//! Default facet hooks.
//!
//! Two canonical sets exist. [`canonical_hooks`] wires the full message
//! plane: listeners, statistics, queries, router, queue, processor,
//! scheduler, hierarchy. [`synchronous_hooks`] swaps the scheduler for a
//! `synchronous` facet that processes inline through the queue-bypassing
//! path.
//!
//! Every hook here follows the same shape: the factory constructs the
//! facet's component (configured from the resolved ctx) and stores it under
//! the conventional `state` handle; hooks whose component needs other facets
//! defer construction to `on_init`, by which point the plan guarantees their
//! dependencies are initialized.

use std::any::Any;
use std::sync::Arc;

use crate::facet::FacetError;
use crate::hook::DefaultHooks;
use crate::manager::FacetManager;

mod hierarchy;
mod listener_set;
mod processing;
mod query_set;
mod routing;
mod scheduling;
mod stat_set;
mod sync_inline;
mod work_queue;

pub use hierarchy::hierarchy_hook;
pub use listener_set::listeners_hook;
pub use processing::processor_hook;
pub use query_set::queries_hook;
pub use routing::router_hook;
pub use scheduling::scheduler_hook;
pub use stat_set::statistics_hook;
pub use sync_inline::synchronous_hook;
pub use work_queue::queue_hook;

/// Source tag carried by every default hook.
pub const DEFAULT_SOURCE: &str = "weft:defaults";

/// The canonical default set: the full scheduled message plane.
#[must_use]
pub fn canonical_hooks() -> DefaultHooks {
    let mut hooks = DefaultHooks::new();
    hooks
        .add(listeners_hook())
        .add(statistics_hook())
        .add(queries_hook())
        .add(router_hook())
        .add(queue_hook())
        .add(processor_hook())
        .add(scheduler_hook())
        .add(hierarchy_hook());
    hooks
}

/// The synchronous default set: canonical minus the scheduler, plus a
/// `synchronous` facet that processes inline.
#[must_use]
pub fn synchronous_hooks() -> DefaultHooks {
    let mut hooks = DefaultHooks::new();
    hooks
        .add(listeners_hook())
        .add(statistics_hook())
        .add(queries_hook())
        .add(router_hook())
        .add(queue_hook())
        .add(processor_hook())
        .add(synchronous_hook())
        .add(hierarchy_hook());
    hooks
}

/// Fetches the `state` handle of a facet another facet depends on.
pub(crate) fn required_state<T: Any + Send + Sync>(
    manager: &FacetManager,
    kind: &str,
) -> Result<Arc<T>, FacetError> {
    optional_state(manager, kind)
        .ok_or_else(|| FacetError::init_failed(format!("required facet '{kind}' is unavailable")))
}

/// Fetches the `state` handle of a facet that may be absent.
pub(crate) fn optional_state<T: Any + Send + Sync>(
    manager: &FacetManager,
    kind: &str,
) -> Option<Arc<T>> {
    manager.find(kind).and_then(|shared| shared.read().state::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::Hook;
    use crate::kinds;

    #[test]
    fn canonical_set_covers_the_scheduled_plane() {
        let hooks = canonical_hooks();
        let hook_kinds: Vec<&str> = hooks.iter().map(Hook::kind).collect();
        assert_eq!(
            hook_kinds,
            vec![
                kinds::LISTENERS,
                kinds::STATISTICS,
                kinds::QUERIES,
                kinds::ROUTER,
                kinds::QUEUE,
                kinds::PROCESSOR,
                kinds::SCHEDULER,
                kinds::HIERARCHY,
            ]
        );
    }

    #[test]
    fn synchronous_set_swaps_scheduler_for_synchronous() {
        let hooks = synchronous_hooks();
        let hook_kinds: Vec<&str> = hooks.iter().map(Hook::kind).collect();
        assert!(hook_kinds.contains(&kinds::SYNCHRONOUS));
        assert!(!hook_kinds.contains(&kinds::SCHEDULER));
    }

    #[test]
    fn every_default_kind_is_canonical() {
        for hooks in [canonical_hooks(), synchronous_hooks()] {
            for hook in hooks.iter() {
                assert!(
                    kinds::is_canonical(hook.kind()),
                    "default hook kind '{}' must be canonical",
                    hook.kind()
                );
            }
        }
    }
}
