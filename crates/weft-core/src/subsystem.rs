// SPDX-License-Identifier: Apache-2.0

//! Subsystems: named runtime aggregates of facets.
//!
//! A subsystem owns its facet manager, its hook lists, its children, and the
//! context it will be (or was) built against. Facets flagged for attachment
//! surface through [`Subsystem::get`] and the typed component accessors.
//!
//! Ownership: a subsystem owns its immediate children. The parent is visible
//! to a child only as an `Arc` snapshot of the parent's resolved context — a
//! non-owning back-reference that cannot form a cycle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::ctx::Ctx;
use crate::hook::{DefaultHooks, Hook};
use crate::hooks;
use crate::kinds;
use crate::listeners::ListenerRegistry;
use crate::manager::{FacetManager, SharedFacet};
use crate::message::SharedMessage;
use crate::plan::Plan;
use crate::processor::Processor;
use crate::queries::QueryRegistry;
use crate::queue::MessageQueue;
use crate::router::Router;
use crate::scheduler::{Scheduler, SliceReport};
use crate::stats::StatsRegistry;

/// Registry of child subsystems, held by the hierarchy facet.
#[derive(Default)]
pub struct ChildRegistry {
    children: Mutex<Vec<Subsystem>>,
}

impl fmt::Debug for ChildRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ChildRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a child subsystem to be built with the parent.
    pub fn add(&self, child: Subsystem) {
        self.children.lock().push(child);
    }

    /// Removes and returns every registered child.
    #[must_use]
    pub fn drain(&self) -> Vec<Subsystem> {
        std::mem::take(&mut *self.children.lock())
    }

    /// Number of registered children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    /// Whether no children are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }
}

/// A named subsystem assembled from dependency-ordered facets.
pub struct Subsystem {
    pub(crate) name: String,
    pub(crate) ctx: Ctx,
    pub(crate) pending_ctx: Vec<Ctx>,
    pub(crate) default_hooks: DefaultHooks,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) manager: FacetManager,
    pub(crate) children: Vec<Subsystem>,
    pub(crate) plan: Option<Plan>,
    pub(crate) built: bool,
}

impl fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subsystem")
            .field("name", &self.name)
            .field("facets", &self.manager.all_kinds())
            .field("children", &self.children.len())
            .field("built", &self.built)
            .finish_non_exhaustive()
    }
}

impl Subsystem {
    /// Creates a subsystem with the canonical default hook set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let manager = FacetManager::new(name.clone());
        Self {
            name,
            ctx: Ctx::new(),
            pending_ctx: Vec::new(),
            default_hooks: hooks::canonical_hooks(),
            hooks: Vec::new(),
            manager,
            children: Vec::new(),
            plan: None,
            built: false,
        }
    }

    /// Creates a subsystem with the synchronous default hook set, which
    /// processes inline instead of through the scheduler.
    #[must_use]
    pub fn new_synchronous(name: impl Into<String>) -> Self {
        let mut subsystem = Self::new(name);
        subsystem.default_hooks = hooks::synchronous_hooks();
        subsystem
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Replaces the default hook set. Drops any cached plan.
    pub fn set_default_hooks(&mut self, hooks: DefaultHooks) -> &mut Self {
        self.default_hooks = hooks;
        self.plan = None;
        self
    }

    /// The default hook set.
    #[must_use]
    pub fn default_hooks(&self) -> &DefaultHooks {
        &self.default_hooks
    }

    /// Mutable access to the default hook set. Drops any cached plan.
    pub fn default_hooks_mut(&mut self) -> &mut DefaultHooks {
        self.plan = None;
        &mut self.default_hooks
    }

    /// Appends a user hook, run after the default hooks. Drops any cached plan.
    pub fn add_hook(&mut self, hook: Hook) -> &mut Self {
        self.hooks.push(hook);
        self.plan = None;
        self
    }

    /// Builder-style variant of [`Subsystem::add_hook`].
    #[must_use]
    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.add_hook(hook);
        self
    }

    /// Records a context delta, merged (config deep-merged) during verify.
    /// Drops any cached plan.
    pub fn with_ctx(&mut self, delta: Ctx) -> &mut Self {
        self.pending_ctx.push(delta);
        self.plan = None;
        self
    }

    /// Records a `config` subtree delta. Drops any cached plan.
    pub fn with_config(&mut self, config: Value) -> &mut Self {
        let mut delta = Ctx::new();
        delta.insert(crate::ctx::CONFIG_KEY, config);
        self.with_ctx(delta)
    }

    /// Discards every pending context delta. Drops any cached plan.
    pub fn clear_ctx(&mut self) -> &mut Self {
        self.pending_ctx.clear();
        self.plan = None;
        self
    }

    /// Drops any cached plan without touching pending context deltas.
    pub fn invalidate(&mut self) -> &mut Self {
        self.plan = None;
        self
    }

    /// The cached plan, if verification has run since the last change.
    #[must_use]
    pub fn cached_plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Adds a child subsystem, built (and recursed into) with the parent.
    pub fn add_child(&mut self, child: Subsystem) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Builder-style variant of [`Subsystem::add_child`].
    #[must_use]
    pub fn with_child(mut self, child: Subsystem) -> Self {
        self.add_child(child);
        self
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The subsystem's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subsystem's context (resolved once built).
    #[must_use]
    pub fn ctx(&self) -> &Ctx {
        &self.ctx
    }

    /// Whether the subsystem has been built.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The facet manager.
    #[must_use]
    pub fn facets(&self) -> &FacetManager {
        &self.manager
    }

    /// Mutable access to the facet manager.
    pub fn facets_mut(&mut self) -> &mut FacetManager {
        &mut self.manager
    }

    /// Child subsystems.
    #[must_use]
    pub fn children(&self) -> &[Subsystem] {
        &self.children
    }

    /// Mutable access to child subsystems.
    pub fn children_mut(&mut self) -> &mut [Subsystem] {
        &mut self.children
    }

    /// Returns the attached facet registered under `kind`.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<SharedFacet> {
        self.manager.attached(kind)
    }

    /// Downcasts the `state` handle of the facet registered under `kind`.
    #[must_use]
    pub fn component<T: Any + Send + Sync>(&self, kind: &str) -> Option<Arc<T>> {
        let shared = self.manager.find(kind)?;
        let state = shared.read().state::<T>();
        state
    }

    /// The router component, when the router facet is installed.
    #[must_use]
    pub fn router(&self) -> Option<Arc<Router>> {
        self.component(kinds::ROUTER)
    }

    /// The queue component, when the queue facet is installed.
    #[must_use]
    pub fn queue(&self) -> Option<Arc<MessageQueue>> {
        self.component(kinds::QUEUE)
    }

    /// The scheduler component, when the scheduler facet is installed.
    #[must_use]
    pub fn scheduler(&self) -> Option<Arc<Scheduler>> {
        self.component(kinds::SCHEDULER)
    }

    /// The processor component, when the processor facet is installed.
    #[must_use]
    pub fn processor(&self) -> Option<Arc<Processor>> {
        self.component(kinds::PROCESSOR)
    }

    /// The statistics registry, when the statistics facet is installed.
    #[must_use]
    pub fn statistics(&self) -> Option<Arc<StatsRegistry>> {
        self.component(kinds::STATISTICS)
    }

    /// The listener registry, when the listeners facet is installed.
    #[must_use]
    pub fn listeners(&self) -> Option<Arc<ListenerRegistry>> {
        self.component(kinds::LISTENERS)
    }

    /// The query registry, when the queries facet is installed.
    #[must_use]
    pub fn queries(&self) -> Option<Arc<QueryRegistry>> {
        self.component(kinds::QUERIES)
    }

    /// The child registry, when the hierarchy facet is installed.
    #[must_use]
    pub fn hierarchy(&self) -> Option<Arc<ChildRegistry>> {
        self.component(kinds::HIERARCHY)
    }

    // ------------------------------------------------------------------
    // Conveniences over installed components
    // ------------------------------------------------------------------

    /// Accepts a message through the installed processor.
    ///
    /// Returns false when no processor facet is installed.
    pub fn accept(&self, msg: SharedMessage) -> bool {
        self.processor()
            .is_some_and(|p| p.accept(msg).is_ok())
    }

    /// Runs one scheduler slice of the given budget.
    ///
    /// Returns `None` when no scheduler facet is installed.
    #[must_use]
    pub fn process(&self, slice: Duration) -> Option<SliceReport> {
        self.scheduler().map(|s| s.process(slice))
    }

    /// Tears the subsystem down: children first (reverse order), then every
    /// facet in insertion order. The subsystem may be built again afterwards.
    pub fn dispose(&mut self) {
        for child in self.children.iter_mut().rev() {
            child.dispose();
        }
        if let Some(listeners) = self.listeners() {
            listeners.emit(
                "subsystem:disposed",
                &serde_json::json!({ "name": self.name }),
            );
        }
        self.manager.dispose_all();
        self.plan = None;
        self.built = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_subsystem_is_unbuilt_with_canonical_defaults() {
        let subsystem = Subsystem::new("test");
        assert!(!subsystem.is_built());
        assert_eq!(subsystem.default_hooks().len(), 8);
        assert!(subsystem.facets().is_empty());
    }

    #[test]
    fn synchronous_set_swaps_scheduler_for_synchronous() {
        let subsystem = Subsystem::new_synchronous("test");
        let hook_kinds: Vec<&str> = subsystem.default_hooks().iter().map(Hook::kind).collect();
        assert!(hook_kinds.contains(&kinds::SYNCHRONOUS));
        assert!(!hook_kinds.contains(&kinds::SCHEDULER));
    }

    #[test]
    fn child_registry_drains_in_insertion_order() {
        let registry = ChildRegistry::new();
        registry.add(Subsystem::new("first"));
        registry.add(Subsystem::new("second"));
        assert_eq!(registry.len(), 2);

        let drained = registry.drain();
        let names: Vec<&str> = drained.iter().map(Subsystem::name).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn component_accessors_are_none_before_build() {
        let subsystem = Subsystem::new("test");
        assert!(subsystem.router().is_none());
        assert!(subsystem.scheduler().is_none());
        assert!(subsystem.get(kinds::ROUTER).is_none());
    }
}
