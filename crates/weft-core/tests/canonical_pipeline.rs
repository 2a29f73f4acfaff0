// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests over the canonical default facet set.

use std::time::Duration;

use serde_json::{json, Value};
use weft_core::{
    kinds, Envelope, Message as _, RouteParams, SliceStatus, Subsystem, STAT_TIME_SLICES,
};

fn built_subsystem(name: &str) -> Subsystem {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut subsystem = Subsystem::new(name);
    if let Err(err) = subsystem.build(None) {
        unreachable!("canonical build must succeed: {err}");
    }
    subsystem
}

#[test]
fn canonical_build_installs_and_attaches_all_facets() {
    let subsystem = built_subsystem("pipeline");
    assert!(subsystem.is_built());

    for kind in [
        kinds::LISTENERS,
        kinds::STATISTICS,
        kinds::QUERIES,
        kinds::ROUTER,
        kinds::QUEUE,
        kinds::PROCESSOR,
        kinds::SCHEDULER,
        kinds::HIERARCHY,
    ] {
        assert!(subsystem.facets().has(kind), "facet '{kind}' must be installed");
        assert!(subsystem.get(kind).is_some(), "facet '{kind}' must be attached");
    }
    assert!(!subsystem.facets().has(kinds::SYNCHRONOUS));
}

#[test]
fn scheduler_drains_two_messages() {
    let subsystem = built_subsystem("pipeline");
    let (Some(router), Some(processor), Some(scheduler), Some(stats)) = (
        subsystem.router(),
        subsystem.processor(),
        subsystem.scheduler(),
        subsystem.statistics(),
    ) else {
        unreachable!("canonical facets must be installed")
    };

    assert!(router
        .register("test/path", |_msg, _params: &RouteParams| Ok(Some(json!({"ok": true}))))
        .is_ok());

    let slices_before = stats.counter(STAT_TIME_SLICES);
    assert!(processor.accept(Envelope::new("test/path", Value::Null).shared()).is_ok());
    assert!(processor.accept(Envelope::new("test/path", Value::Null).shared()).is_ok());

    let report = scheduler.process(Duration::from_millis(100));
    assert_eq!(report.status, SliceStatus::Completed);
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors, 0);
    assert_eq!(stats.counter(STAT_TIME_SLICES), slices_before + 1);
}

#[test]
fn paused_scheduler_reports_paused_and_keeps_queue() {
    let subsystem = built_subsystem("pipeline");
    let (Some(router), Some(processor), Some(scheduler), Some(queue)) = (
        subsystem.router(),
        subsystem.processor(),
        subsystem.scheduler(),
        subsystem.queue(),
    ) else {
        unreachable!("canonical facets must be installed")
    };

    assert!(router
        .register("test/path", |_msg, _params: &RouteParams| Ok(None))
        .is_ok());
    assert!(processor.accept(Envelope::new("test/path", Value::Null).shared()).is_ok());

    scheduler.pause_processing();
    let report = scheduler.process(Duration::from_millis(100));
    assert_eq!(report.status, SliceStatus::Paused);
    assert_eq!(report.processed, 0);
    assert_eq!(report.remaining_time, Some(Duration::from_millis(100)));
    assert_eq!(queue.len(), 1, "paused slice must leave the queue untouched");
}

#[test]
fn query_messages_receive_replies_through_the_plane() {
    let subsystem = built_subsystem("pipeline");
    let (Some(router), Some(processor), Some(scheduler), Some(queries)) = (
        subsystem.router(),
        subsystem.processor(),
        subsystem.scheduler(),
        subsystem.queries(),
    ) else {
        unreachable!("canonical facets must be installed")
    };

    assert!(router
        .register("lookup/{key}", |_msg, params: &RouteParams| {
            Ok(Some(json!({ "key": params.get("key") })))
        })
        .is_ok());

    let msg = Envelope::query("lookup/name", Value::Null).shared();
    assert!(processor.accept(msg.clone()).is_ok());
    let _ = scheduler.process(Duration::from_millis(100));

    assert_eq!(msg.query_result(), Some(json!({ "key": "name" })));
    assert_eq!(queries.answered_count(), 1);
    assert_eq!(queries.pending_len(), 0);
}

#[test]
fn synchronous_set_processes_inline() {
    let mut subsystem = Subsystem::new_synchronous("inline");
    if let Err(err) = subsystem.build(None) {
        unreachable!("synchronous build must succeed: {err}");
    }

    assert!(subsystem.facets().has(kinds::SYNCHRONOUS));
    assert!(!subsystem.facets().has(kinds::SCHEDULER));

    let (Some(router), Some(processor), Some(queue)) =
        (subsystem.router(), subsystem.processor(), subsystem.queue())
    else {
        unreachable!("synchronous facets must be installed")
    };
    assert!(router
        .register("inline/path", |_msg, _params: &RouteParams| Ok(Some(json!(1))))
        .is_ok());

    let msg = Envelope::new("inline/path", Value::Null).shared();
    let reply = processor.process_immediately(&msg);
    assert!(matches!(reply, Ok(Some(v)) if v == json!(1)));
    assert!(queue.is_empty(), "immediate path must bypass the queue");
}

#[test]
fn subsystem_conveniences_drive_the_plane() {
    let subsystem = built_subsystem("pipeline");
    let Some(router) = subsystem.router() else {
        unreachable!("router must be installed")
    };
    assert!(router
        .register("conv/path", |_msg, _params: &RouteParams| Ok(None))
        .is_ok());

    assert!(subsystem.accept(Envelope::new("conv/path", Value::Null).shared()));
    let Some(report) = subsystem.process(Duration::from_millis(50)) else {
        unreachable!("scheduler must be installed")
    };
    assert_eq!(report.processed, 1);
}

#[test]
fn listeners_observe_build_and_dispose() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let mut subsystem = built_subsystem("observable");
    let Some(listeners) = subsystem.listeners() else {
        unreachable!("listeners must be installed")
    };
    let disposed = Arc::new(AtomicUsize::new(0));
    let seen = disposed.clone();
    let _ = listeners.on("subsystem:disposed", move |_event, _payload| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    subsystem.dispose();
    assert!(!subsystem.is_built());
    assert!(subsystem.facets().is_empty());
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn scheduler_respects_configured_slice_budget() {
    let mut subsystem = Subsystem::new("configured");
    subsystem.with_config(json!({
        "scheduler": {"maxMessagesPerSlice": 1}
    }));
    if let Err(err) = subsystem.build(None) {
        unreachable!("configured build must succeed: {err}");
    }

    let (Some(router), Some(processor), Some(scheduler), Some(queue)) = (
        subsystem.router(),
        subsystem.processor(),
        subsystem.scheduler(),
        subsystem.queue(),
    ) else {
        unreachable!("canonical facets must be installed")
    };
    assert!(router
        .register("cfg/path", |_msg, _params: &RouteParams| Ok(None))
        .is_ok());
    for _ in 0..3 {
        assert!(processor.accept(Envelope::new("cfg/path", Value::Null).shared()).is_ok());
    }

    let report = scheduler.process(Duration::from_millis(100));
    assert_eq!(report.processed, 1);
    assert_eq!(queue.len(), 2);
}
