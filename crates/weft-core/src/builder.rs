// SPDX-License-Identifier: Apache-2.0

//! Two-phase subsystem builder: verify (plan) → build (install).
//!
//! Verification resolves the context, materializes facets from the hook
//! lists, validates dependencies, and produces a topological installation
//! order — consulting the shared graph cache when one is attached. The plan
//! is cached on the subsystem until the context changes.
//!
//! Building installs the planned facets under a single manager transaction,
//! initializing each in dependency order and attaching the flagged ones. Any
//! init failure — or a processor-contract violation — rolls the transaction
//! back (reverse dispose) and propagates. Afterwards children are collected
//! from the hierarchy facet and the subsystem's own child list, seeded with
//! the parent's resolved context and graph cache, and built recursively.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::{processor_contract, ContractError};
use crate::facet::Facet;
use crate::graph_cache::{signature, SharedGraphCache, SignatureEntry};
use crate::hook::HookArgs;
use crate::kinds;
use crate::manager::{AddOptions, ManagerError};
use crate::plan::{order_kinds, Plan, PlanError};
use crate::subsystem::{ChildRegistry, Subsystem};

/// Errors raised while building a subsystem.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Verification failed.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// Facet installation or initialization failed.
    #[error(transparent)]
    Manager(#[from] ManagerError),
    /// An installed facet violates its contract.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// A child subsystem failed to build.
    #[error("failed to build child '{name}': {source}")]
    Child {
        /// The child's name.
        name: String,
        /// The underlying failure.
        source: Box<BuildError>,
    },
}

impl Subsystem {
    /// Verifies the subsystem, producing (and caching) a build plan.
    ///
    /// The plan stays cached until a context change, [`Subsystem::invalidate`],
    /// or a build consumes it. A failed verification caches nothing.
    pub fn plan(&mut self, cache: Option<&SharedGraphCache>) -> Result<&Plan, PlanError> {
        if self.plan.is_none() {
            let plan = self.compute_plan(cache)?;
            self.plan = Some(plan);
        }
        let Some(plan) = self.plan.as_ref() else {
            unreachable!("plan was stored above")
        };
        Ok(plan)
    }

    fn compute_plan(&self, cache: Option<&SharedGraphCache>) -> Result<Plan, PlanError> {
        // 1. Context resolution: base ctx, then deltas in insertion order.
        let mut resolved = self.ctx.clone();
        for delta in &self.pending_ctx {
            resolved.merge(delta);
        }
        if let Some(cache) = cache {
            resolved.set_graph_cache(cache.clone());
        }

        // 2–3. Hook collection and facet materialization. Later hooks with
        // the overwrite flag replace earlier facets of the same kind; the
        // replaced facet keeps its original position in the order.
        let args = HookArgs {
            ctx: &resolved,
            subsystem: &self.name,
        };
        let mut facets: FxHashMap<String, Facet> = FxHashMap::default();
        let mut order: Vec<String> = Vec::new();
        for hook in self.default_hooks.iter().chain(self.hooks.iter()) {
            let facet = hook.invoke(&args)?;
            let kind = facet.kind().to_owned();
            if facets.contains_key(&kind) {
                if facet.should_overwrite() {
                    facets.insert(kind, facet);
                } else {
                    return Err(PlanError::DuplicateKind { kind });
                }
            } else {
                order.push(kind.clone());
                facets.insert(kind, facet);
            }
        }

        // 4. Dependency validation.
        let mut dependencies: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for (kind, facet) in &facets {
            for dep in facet.dependencies() {
                if !facets.contains_key(&dep) {
                    return Err(PlanError::MissingDependency {
                        kind: kind.clone(),
                        required: dep,
                    });
                }
            }
            dependencies.insert(kind.clone(), facet.dependencies());
        }

        // 5. Topological order, via the graph cache when attached.
        let entries: Vec<SignatureEntry> = order
            .iter()
            .filter_map(|kind| {
                facets.get(kind).map(|facet| SignatureEntry {
                    kind: kind.clone(),
                    overwrite: facet.should_overwrite(),
                    required: facet.dependencies(),
                })
            })
            .collect();
        let sig = signature(&entries);

        let ordered_kinds = if let Some(shared_cache) = resolved.graph_cache() {
            let mut guard = shared_cache.lock();
            if let Some(hit) = guard.get(&sig) {
                debug!(subsystem = %self.name, "dependency order served from cache");
                hit
            } else {
                let computed = order_kinds(&order, &dependencies)?;
                guard.insert(sig, computed.clone());
                computed
            }
        } else {
            order_kinds(&order, &dependencies)?
        };

        Ok(Plan {
            ctx: resolved,
            ordered_kinds,
            facets,
            dependencies,
        })
    }

    /// Builds the subsystem from its plan, creating the plan if missing.
    ///
    /// Idempotent: building an already-built subsystem is a no-op.
    pub fn build(&mut self, cache: Option<&SharedGraphCache>) -> Result<(), BuildError> {
        if self.built {
            return Ok(());
        }

        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => self.compute_plan(cache)?,
        };
        let Plan {
            ctx: resolved,
            ordered_kinds,
            mut facets,
            dependencies: _,
        } = plan;

        // Install every planned facet under one transaction.
        self.manager.begin_transaction()?;
        for kind in &ordered_kinds {
            let Some(facet) = facets.remove(kind) else {
                self.rollback_quiet();
                return Err(ManagerError::NotFound { kind: kind.clone() }.into());
            };
            if let Err(err) = self.manager.add(kind, facet, AddOptions::install(&resolved)) {
                self.rollback_quiet();
                return Err(err.into());
            }
        }

        // Enforce the processor contract on the initialized facet set.
        if let Some(shared) = self.manager.find(kinds::PROCESSOR) {
            let verdict = processor_contract().enforce(&shared.read());
            if let Err(err) = verdict {
                self.rollback_quiet();
                return Err(err.into());
            }
        }

        let _ = self.manager.commit()?;

        // Collect children: hierarchy facet registry first, then own list.
        if let Some(registry) = self.component::<ChildRegistry>(kinds::HIERARCHY) {
            let mut collected = registry.drain();
            if !collected.is_empty() {
                collected.append(&mut self.children);
                self.children = collected;
            }
        }

        let parent_snapshot = Arc::new(resolved.clone());
        let child_cache = resolved.graph_cache();
        for child in &mut self.children {
            if child.built {
                continue;
            }
            child.ctx.set_parent(parent_snapshot.clone());
            if let Some(cache) = &child_cache {
                child.ctx.set_graph_cache(cache.clone());
            }
            let name = child.name.clone();
            child.build(child_cache.as_ref()).map_err(|err| BuildError::Child {
                name,
                source: Box::new(err),
            })?;
        }

        self.ctx = resolved;
        self.pending_ctx.clear();
        self.built = true;
        if let Some(listeners) = self.listeners() {
            listeners.emit("subsystem:built", &json!({ "name": self.name }));
        }
        debug!(subsystem = %self.name, facets = self.manager.len(), "subsystem built");
        Ok(())
    }

    fn rollback_quiet(&mut self) {
        if let Err(err) = self.manager.rollback() {
            warn!(subsystem = %self.name, error = %err, "rollback after failed build did not complete");
        }
    }
}
