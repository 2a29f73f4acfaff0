// SPDX-License-Identifier: Apache-2.0

//! Subsystem build context.
//!
//! A [`Ctx`] carries the JSON configuration values a subsystem is built
//! against, plus the two resources that cannot be represented as data: the
//! shared dependency-graph cache and (for child subsystems) a snapshot of the
//! parent's resolved context.
//!
//! Merging is shallow per key, except for the `config` key whose object value
//! is deep-merged so per-facet sub-configs accumulate across deltas.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::graph_cache::SharedGraphCache;

/// Shared opaque resource stored on a context.
pub type CtxResource = Arc<dyn Any + Send + Sync>;

/// Key under which facet configuration lives; deep-merged across deltas.
pub const CONFIG_KEY: &str = "config";

/// Errors raised while reading context values.
#[derive(Debug, Error)]
pub enum CtxError {
    /// A facet sub-config did not deserialize into its typed form.
    #[error("invalid config for facet '{facet}': {reason}")]
    InvalidConfig {
        /// Facet whose sub-config failed to parse.
        facet: String,
        /// Deserializer message.
        reason: String,
    },
}

/// Build context: JSON values plus out-of-band resources.
#[derive(Clone, Default)]
pub struct Ctx {
    values: Map<String, Value>,
    resources: FxHashMap<String, CtxResource>,
    graph_cache: Option<SharedGraphCache>,
    parent: Option<Arc<Ctx>>,
}

impl std::fmt::Debug for Ctx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ctx")
            .field("values", &self.values)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("has_graph_cache", &self.graph_cache.is_some())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Ctx {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from a JSON object. Non-object values yield an
    /// empty context.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self {
                values,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Returns the `config` subtree, if present.
    #[must_use]
    pub fn config(&self) -> Option<&Value> {
        self.values.get(CONFIG_KEY)
    }

    /// Deserializes the sub-config for `facet` out of the `config` subtree.
    ///
    /// A missing sub-config yields `T::default()`; a present but malformed
    /// one is an error rather than a silent default.
    pub fn facet_config<T>(&self, facet: &str) -> Result<T, CtxError>
    where
        T: DeserializeOwned + Default,
    {
        match self.config().and_then(|c| c.get(facet)) {
            None => Ok(T::default()),
            Some(raw) => {
                serde_json::from_value(raw.clone()).map_err(|err| CtxError::InvalidConfig {
                    facet: facet.to_owned(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Merges `delta` into this context: shallow per key, deep for `config`.
    pub fn merge(&mut self, delta: &Ctx) {
        for (key, incoming) in &delta.values {
            if key == CONFIG_KEY {
                match self.values.get_mut(CONFIG_KEY) {
                    Some(existing) => deep_merge(existing, incoming),
                    None => {
                        self.values.insert(key.clone(), incoming.clone());
                    }
                }
            } else {
                self.values.insert(key.clone(), incoming.clone());
            }
        }
        for (key, resource) in &delta.resources {
            self.resources.insert(key.clone(), resource.clone());
        }
        if delta.graph_cache.is_some() {
            self.graph_cache.clone_from(&delta.graph_cache);
        }
        if delta.parent.is_some() {
            self.parent.clone_from(&delta.parent);
        }
    }

    /// Stores an opaque shared resource that cannot be represented as JSON
    /// (a kernel transport, say), replacing any previous value.
    pub fn set_resource(
        &mut self,
        key: impl Into<String>,
        resource: CtxResource,
    ) -> &mut Self {
        self.resources.insert(key.into(), resource);
        self
    }

    /// Downcasts the resource stored under `key` to `T`.
    #[must_use]
    pub fn resource<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.resources
            .get(key)
            .and_then(|r| r.clone().downcast::<T>().ok())
    }

    /// Returns the shared graph cache, if one has been attached.
    #[must_use]
    pub fn graph_cache(&self) -> Option<SharedGraphCache> {
        self.graph_cache.clone()
    }

    /// Attaches a shared graph cache.
    pub fn set_graph_cache(&mut self, cache: SharedGraphCache) -> &mut Self {
        self.graph_cache = Some(cache);
        self
    }

    /// Returns the parent subsystem's resolved context snapshot, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Ctx>> {
        self.parent.as_ref()
    }

    /// Records a snapshot of the parent subsystem's resolved context.
    pub fn set_parent(&mut self, parent: Arc<Ctx>) -> &mut Self {
        self.parent = Some(parent);
        self
    }

    /// Iterates over the stored `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Whether the context carries no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Recursively merges `src` into `dst`. Objects merge per key; every other
/// value type replaces the destination.
fn deep_merge(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (key, value) in src_map {
                match dst_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        dst_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (dst_slot, _) => {
            *dst_slot = src.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shallow_merge_replaces_plain_keys() {
        let mut base = Ctx::from_value(json!({"region": "eu", "tier": 1}));
        let delta = Ctx::from_value(json!({"tier": 2}));
        base.merge(&delta);
        assert_eq!(base.get("region"), Some(&json!("eu")));
        assert_eq!(base.get("tier"), Some(&json!(2)));
    }

    #[test]
    fn config_key_deep_merges_across_deltas() {
        let mut base = Ctx::from_value(json!({
            "config": {"router": {"cacheCapacity": 8}}
        }));
        let delta = Ctx::from_value(json!({
            "config": {"scheduler": {"maxMessagesPerSlice": 3}, "router": {"debug": true}}
        }));
        base.merge(&delta);
        let config = base.config().cloned().unwrap_or(Value::Null);
        assert_eq!(config["router"]["cacheCapacity"], 8);
        assert_eq!(config["router"]["debug"], true);
        assert_eq!(config["scheduler"]["maxMessagesPerSlice"], 3);
    }

    #[test]
    fn facet_config_defaults_when_absent() {
        #[derive(Debug, Default, serde::Deserialize)]
        struct Probe {
            #[serde(default)]
            depth: u32,
        }
        let ctx = Ctx::new();
        let probe: Probe = ctx.facet_config("probe").map_or_else(
            |_| Probe { depth: u32::MAX },
            |p| p,
        );
        assert_eq!(probe.depth, 0);
    }

    #[test]
    fn facet_config_rejects_malformed_values() {
        #[derive(Debug, Default, serde::Deserialize)]
        struct Probe {
            #[serde(default)]
            #[allow(dead_code)]
            depth: u32,
        }
        let ctx = Ctx::from_value(json!({"config": {"probe": {"depth": "not-a-number"}}}));
        let result: Result<Probe, CtxError> = ctx.facet_config("probe");
        assert!(result.is_err(), "malformed config must not silently default");
    }

    #[test]
    fn from_non_object_value_is_empty() {
        let ctx = Ctx::from_value(json!(42));
        assert!(ctx.is_empty());
    }

    #[test]
    fn resources_downcast_by_type_and_merge() {
        let mut base = Ctx::new();
        let mut delta = Ctx::new();
        delta.set_resource("principals.kernel", Arc::new(42_u64));
        base.merge(&delta);

        assert_eq!(base.resource::<u64>("principals.kernel").as_deref(), Some(&42));
        assert!(base.resource::<String>("principals.kernel").is_none());
        assert!(base.resource::<u64>("ghost").is_none());
    }
}
