// SPDX-License-Identifier: Apache-2.0
//! weft-core: composable message subsystem framework.
//!
//! A subsystem assembles its runtime behavior from interchangeable,
//! dependency-ordered facets — router, queue, scheduler, processor,
//! listeners, statistics — planned by a two-phase (verify → build) builder
//! and owned by a transactional facet manager. Messages flow from
//! `processor.accept` through the priority queue into the cooperative
//! time-sliced scheduler, which routes each one to its longest-prefix
//! pattern handler.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod builder;
mod config;
mod contract;
mod ctx;
mod facet;
mod graph_cache;
mod hook;
/// Default facet hooks (canonical and synchronous sets).
pub mod hooks;
/// Canonical facet kind names.
pub mod kinds;
mod listeners;
mod manager;
mod message;
mod plan;
mod processor;
mod queries;
mod queue;
mod router;
mod scheduler;
mod stats;
mod subsystem;

// Re-exports for stable public API
/// Build errors raised while installing a subsystem's facets.
pub use builder::BuildError;
/// Typed facet configuration read from the subsystem ctx.
pub use config::{
    QueueConfig, QueuePolicy, RouterConfig, SchedulerConfig, SchedulingStrategy,
    DEFAULT_MAX_MESSAGES_PER_SLICE, DEFAULT_ROUTE_CACHE_CAPACITY, DEFAULT_SCHEDULER_PRIORITY,
};
/// Facet contracts and the processor contract enforcer.
pub use contract::{processor_contract, ContractError, FacetContract};
/// Build context with shallow/deep merge semantics.
pub use ctx::{Ctx, CtxError, CtxResource, CONFIG_KEY};
/// Facets and their members, callbacks, and errors.
pub use facet::{
    DisposeFn, Facet, FacetError, InitArgs, InitFn, Member, MethodCall, MethodFn, SharedHandle,
    STATE_MEMBER,
};
/// Memoized dependency-order cache.
pub use graph_cache::{
    signature, GraphCache, SharedGraphCache, Signature, SignatureEntry,
    DEFAULT_GRAPH_CACHE_CAPACITY,
};
/// Hooks: annotated facet factories and default-hook sets.
pub use hook::{DefaultHooks, Hook, HookArgs, HookFactory, HookMeta};
/// Event listener registry used by the listeners facet.
pub use listeners::{ListenerFn, ListenerId, ListenerRegistry};
/// Transactional facet container.
pub use manager::{AddOptions, FacetManager, ManagerError, SharedFacet, RESERVED_PROPERTIES};
/// Message contract and the in-process envelope.
pub use message::{Envelope, Message, SharedMessage};
/// Build plans produced by verification.
pub use plan::{Plan, PlanError};
/// Message processor tying router, queue, and observers together.
pub use processor::{Processor, ProcessorError, TickReport};
/// Query bookkeeping used by the queries facet.
pub use queries::QueryRegistry;
/// Priority queue with statistics hooks.
pub use queue::{EnqueueOptions, EnqueueOutcome, MessageQueue, QueueError, QueuedEntry};
/// Pattern router with longest-literal matching.
pub use router::{
    HandlerError, RouteHandler, RouteMatch, RouteMeta, RouteParams, Router, RouterError,
};
/// Cooperative time-sliced scheduler.
pub use scheduler::{Scheduler, SchedulerError, SchedulerUpdate, SliceReport, SliceStatus};
/// Statistics sink trait, null sink, and counter registry.
pub use stats::{
    NullStatsSink, StatsHandle, StatsRegistry, StatsSink, STAT_DEQUEUED, STAT_ENQUEUED,
    STAT_HANDLER_ERRORS, STAT_ROUTED, STAT_TIME_SLICES,
};
/// Subsystems and the hierarchy child registry.
pub use subsystem::{ChildRegistry, Subsystem};
