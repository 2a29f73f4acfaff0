// SPDX-License-Identifier: Apache-2.0

//! Build plans: the product of subsystem verification.
//!
//! A plan pairs the resolved context with the facets materialized from the
//! hook list and a topological installation order. Plans are cached on the
//! builder until the context changes or the plan is consumed by a build;
//! invalid plans are never cached.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ctx::{Ctx, CtxError};
use crate::facet::{Facet, FacetError};

/// Errors raised during planning.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Two hooks produced facets of the same kind without overwrite.
    #[error("duplicate facet kind '{kind}'")]
    DuplicateKind {
        /// The colliding kind.
        kind: String,
    },
    /// A facet requires a kind no hook produces.
    #[error("missing dependency '{required}' for facet '{kind}'")]
    MissingDependency {
        /// The facet declaring the dependency.
        kind: String,
        /// The absent dependency kind.
        required: String,
    },
    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected among: {kinds}")]
    CycleDetected {
        /// Comma-separated kinds stuck in the cycle.
        kinds: String,
    },
    /// A hook factory failed.
    #[error(transparent)]
    Facet(#[from] FacetError),
    /// The resolved context is malformed.
    #[error(transparent)]
    Ctx(#[from] CtxError),
}

/// The resolved product of verification.
#[derive(Debug)]
pub struct Plan {
    /// Resolved build context (base ctx plus deltas, config deep-merged).
    pub ctx: Ctx,
    /// Topological installation order over the facet kinds.
    pub ordered_kinds: Vec<String>,
    /// Materialized, un-initialized facets by kind. Consumed by the build.
    pub facets: FxHashMap<String, Facet>,
    /// Dependency edges: kind → its required kinds. Retained so a
    /// task-parallel executor can be layered on without re-planning.
    pub dependencies: FxHashMap<String, Vec<String>>,
}

impl Plan {
    /// Number of planned facets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered_kinds.len()
    }

    /// Whether the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered_kinds.is_empty()
    }
}

/// Topologically sorts `kinds` (given in materialization order) against
/// `dependencies`, breaking ties by materialization order.
///
/// Kahn's algorithm over in-degrees; any unprocessed remainder is a cycle.
pub(crate) fn order_kinds(
    kinds: &[String],
    dependencies: &FxHashMap<String, Vec<String>>,
) -> Result<Vec<String>, PlanError> {
    let index_of: FxHashMap<&str, usize> = kinds
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();

    let mut in_degree: FxHashMap<&str, usize> = kinds.iter().map(|k| (k.as_str(), 0)).collect();
    let mut dependents: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for kind in kinds {
        if let Some(required) = dependencies.get(kind) {
            for dep in required {
                if let Some(count) = in_degree.get_mut(kind.as_str()) {
                    *count += 1;
                }
                dependents.entry(dep.as_str()).or_default().push(kind.as_str());
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = kinds
        .iter()
        .filter(|k| in_degree.get(k.as_str()).copied() == Some(0))
        .filter_map(|k| index_of.get(k.as_str()).copied())
        .map(Reverse)
        .collect();

    let mut ordered = Vec::with_capacity(kinds.len());
    while let Some(Reverse(i)) = ready.pop() {
        let kind = kinds[i].as_str();
        ordered.push(kind.to_owned());
        if let Some(children) = dependents.get(kind) {
            for child in children {
                if let Some(count) = in_degree.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        if let Some(&ci) = index_of.get(child) {
                            ready.push(Reverse(ci));
                        }
                    }
                }
            }
        }
    }

    if ordered.len() != kinds.len() {
        let mut stuck: Vec<&str> = kinds
            .iter()
            .map(String::as_str)
            .filter(|k| !ordered.iter().any(|o| o == k))
            .collect();
        stuck.sort_unstable();
        return Err(PlanError::CycleDetected {
            kinds: stuck.join(", "),
        });
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    fn deps(edges: &[(&str, &[&str])]) -> FxHashMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(k, required)| {
                (
                    (*k).to_owned(),
                    required.iter().map(|s| (*s).to_owned()).collect(),
                )
            })
            .collect()
    }

    fn assert_before(order: &[String], earlier: &str, later: &str) {
        let e = order.iter().position(|k| k == earlier);
        let l = order.iter().position(|k| k == later);
        assert!(
            e < l,
            "expected '{earlier}' before '{later}' in {order:?}"
        );
    }

    #[test]
    fn dependencies_come_first() {
        let order = order_kinds(
            &kinds(&["processor", "router", "queue"]),
            &deps(&[("processor", &["router", "queue"])]),
        );
        let Ok(order) = order else {
            unreachable!("acyclic graph must sort")
        };
        assert_before(&order, "router", "processor");
        assert_before(&order, "queue", "processor");
    }

    #[test]
    fn independent_kinds_keep_materialization_order() {
        let order = order_kinds(&kinds(&["c", "a", "b"]), &FxHashMap::default());
        let Ok(order) = order else {
            unreachable!("acyclic graph must sort")
        };
        assert_eq!(order, kinds(&["c", "a", "b"]));
    }

    #[test]
    fn cycles_are_detected_and_named() {
        let result = order_kinds(
            &kinds(&["a", "b"]),
            &deps(&[("a", &["b"]), ("b", &["a"])]),
        );
        let Err(PlanError::CycleDetected { kinds: stuck }) = result else {
            unreachable!("cycle must be detected")
        };
        assert!(stuck.contains('a'));
        assert!(stuck.contains('b'));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let result = order_kinds(&kinds(&["a"]), &deps(&[("a", &["a"])]));
        assert!(matches!(result, Err(PlanError::CycleDetected { .. })));
    }

    #[test]
    fn diamond_resolves() {
        let order = order_kinds(
            &kinds(&["top", "left", "right", "base"]),
            &deps(&[
                ("top", &["left", "right"]),
                ("left", &["base"]),
                ("right", &["base"]),
            ]),
        );
        let Ok(order) = order else {
            unreachable!("acyclic graph must sort")
        };
        assert_eq!(order.last().map(String::as_str), Some("top"));
        assert_eq!(order.first().map(String::as_str), Some("base"));
    }
}
