// SPDX-License-Identifier: Apache-2.0

//! Hooks: annotated facet factories, and ordered default-hook sets.
//!
//! A hook pairs the metadata of the facet it will produce — kind, required
//! dependencies, attach/overwrite flags, source tag — with a factory closure.
//! The planner reads the metadata without running the factory, which is what
//! makes cached dependency orders possible.

use std::fmt;
use std::sync::Arc;

use crate::ctx::Ctx;
use crate::facet::{Facet, FacetError};

/// Metadata describing the facet a hook produces.
#[derive(Debug, Clone, Default)]
pub struct HookMeta {
    /// Kind of the produced facet.
    pub kind: String,
    /// Dependency kinds the produced facet requires.
    pub required: Vec<String>,
    /// Whether the produced facet is exposed as a subsystem property.
    pub attach: bool,
    /// Whether the produced facet replaces an earlier facet of the same kind.
    pub overwrite: bool,
    /// Tag identifying the producing hook set.
    pub source: String,
}

impl HookMeta {
    /// Creates metadata for `kind` with everything else defaulted.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Sets the required dependency kinds.
    #[must_use]
    pub fn required<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the attach flag.
    #[must_use]
    pub fn attach(mut self, attach: bool) -> Self {
        self.attach = attach;
        self
    }

    /// Sets the overwrite flag.
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Sets the source tag.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Arguments handed to a hook factory during planning.
pub struct HookArgs<'a> {
    /// Resolved build context.
    pub ctx: &'a Ctx,
    /// Name of the subsystem being planned.
    pub subsystem: &'a str,
}

impl fmt::Debug for HookArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookArgs")
            .field("subsystem", &self.subsystem)
            .finish_non_exhaustive()
    }
}

/// Factory closure producing a facet from the resolved context.
pub type HookFactory = Arc<dyn Fn(&HookArgs<'_>) -> Result<Facet, FacetError> + Send + Sync>;

/// A facet factory annotated with the metadata of what it produces.
#[derive(Clone)]
pub struct Hook {
    meta: HookMeta,
    factory: HookFactory,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl Hook {
    /// Creates a hook from metadata and a factory closure.
    #[must_use]
    pub fn new<F>(meta: HookMeta, factory: F) -> Self
    where
        F: Fn(&HookArgs<'_>) -> Result<Facet, FacetError> + Send + Sync + 'static,
    {
        Self {
            meta,
            factory: Arc::new(factory),
        }
    }

    /// The hook's metadata.
    #[must_use]
    pub fn meta(&self) -> &HookMeta {
        &self.meta
    }

    /// Kind of the facet this hook produces.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.meta.kind
    }

    /// Runs the factory and checks the produced facet against the metadata.
    pub fn invoke(&self, args: &HookArgs<'_>) -> Result<Facet, FacetError> {
        let facet = (self.factory)(args)?;
        if facet.kind() != self.meta.kind {
            return Err(FacetError::invalid(format!(
                "hook for kind '{}' produced facet of kind '{}'",
                self.meta.kind,
                facet.kind()
            )));
        }
        Ok(facet)
    }
}

/// Ordered, forkable collection of default hooks.
#[derive(Debug, Clone, Default)]
pub struct DefaultHooks {
    entries: Vec<Hook>,
}

impl DefaultHooks {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook, preserving order.
    pub fn add(&mut self, hook: Hook) -> &mut Self {
        self.entries.push(hook);
        self
    }

    /// Removes every hook producing `kind`. Returns whether any was removed.
    pub fn remove(&mut self, kind: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|h| h.kind() != kind);
        self.entries.len() != before
    }

    /// Removes every hook.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The hooks in order.
    #[must_use]
    pub fn list(&self) -> &[Hook] {
        &self.entries
    }

    /// Returns an independent copy that can diverge from this one.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the hooks in order.
    pub fn iter(&self) -> impl Iterator<Item = &Hook> {
        self.entries.iter()
    }
}
