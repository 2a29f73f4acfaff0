// SPDX-License-Identifier: Apache-2.0

//! Typed facet configuration.
//!
//! These structs deserialize out of the `config` subtree of a subsystem ctx
//! (`config.router`, `config.queue`, `config.scheduler`). Keys are camelCase
//! on the wire; every field has a serde default so partial configs compose
//! with [`crate::ctx::Ctx::merge`].

use serde::Deserialize;

/// Default router match-cache capacity.
pub const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 256;
/// Default number of messages a scheduler drains per slice.
pub const DEFAULT_MAX_MESSAGES_PER_SLICE: usize = 10;
/// Default scheduler priority.
pub const DEFAULT_SCHEDULER_PRIORITY: u32 = 1;

/// `config.router` — match cache and trace logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    /// Match-cache size; must be positive (zero clamps to one).
    pub cache_capacity: usize,
    /// Emit a trace event per match attempt.
    pub debug: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_ROUTE_CACHE_CAPACITY,
            debug: false,
        }
    }
}

/// Behavior when an enqueue would exceed a bounded queue's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePolicy {
    /// Refuse the enqueue; the caller sees a queue-full error and may retry.
    #[default]
    Block,
    /// Silently discard the incoming message.
    Drop,
    /// Evict the lowest-ranked queued entry to make room.
    Overflow,
}

/// `config.queue` — capacity and overflow policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfig {
    /// Maximum entries; zero means unbounded.
    pub capacity: usize,
    /// What to do when a bounded queue is full.
    pub policy: QueuePolicy,
}

/// Ordering strategy for the queue drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingStrategy {
    /// Priority descending, enqueue sequence ascending.
    #[default]
    Priority,
    /// Pure enqueue-sequence order.
    Fifo,
}

/// `config.scheduler` — drain strategy, slice budget, priority, tracing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Drain ordering strategy.
    pub scheduling_strategy: SchedulingStrategy,
    /// Maximum messages drained per slice.
    pub max_messages_per_slice: usize,
    /// Scheduler priority (non-negative).
    pub priority: u32,
    /// Emit a trace event per drained message.
    pub debug: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduling_strategy: SchedulingStrategy::Priority,
            max_messages_per_slice: DEFAULT_MAX_MESSAGES_PER_SLICE,
            priority: DEFAULT_SCHEDULER_PRIORITY,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::Ctx;
    use serde_json::json;

    #[test]
    fn scheduler_defaults_match_contract() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.max_messages_per_slice, 10);
        assert_eq!(cfg.priority, 1);
        assert_eq!(cfg.scheduling_strategy, SchedulingStrategy::Priority);
        assert!(!cfg.debug);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let ctx = Ctx::from_value(json!({
            "config": {"scheduler": {"maxMessagesPerSlice": 3}}
        }));
        let cfg: SchedulerConfig = match ctx.facet_config("scheduler") {
            Ok(cfg) => cfg,
            Err(err) => unreachable!("valid config rejected: {err}"),
        };
        assert_eq!(cfg.max_messages_per_slice, 3);
        assert_eq!(cfg.priority, 1);
    }

    #[test]
    fn queue_policy_parses_lowercase_names() {
        let ctx = Ctx::from_value(json!({
            "config": {"queue": {"capacity": 4, "policy": "overflow"}}
        }));
        let cfg: QueueConfig = match ctx.facet_config("queue") {
            Ok(cfg) => cfg,
            Err(err) => unreachable!("valid config rejected: {err}"),
        };
        assert_eq!(cfg.capacity, 4);
        assert_eq!(cfg.policy, QueuePolicy::Overflow);
    }

    #[test]
    fn fifo_strategy_parses() {
        let ctx = Ctx::from_value(json!({
            "config": {"scheduler": {"schedulingStrategy": "fifo"}}
        }));
        let cfg: SchedulerConfig = match ctx.facet_config("scheduler") {
            Ok(cfg) => cfg,
            Err(err) => unreachable!("valid config rejected: {err}"),
        };
        assert_eq!(cfg.scheduling_strategy, SchedulingStrategy::Fifo);
    }
}
