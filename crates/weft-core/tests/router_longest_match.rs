// SPDX-License-Identifier: Apache-2.0

//! Router specificity and lifecycle tests over a built subsystem.

use serde_json::{json, Value};
use weft_core::{Envelope, RouteParams, Router, RouterError, Subsystem};

fn built_router() -> (Subsystem, std::sync::Arc<Router>) {
    let mut subsystem = Subsystem::new("routing");
    if let Err(err) = subsystem.build(None) {
        unreachable!("canonical build must succeed: {err}");
    }
    let Some(router) = subsystem.router() else {
        unreachable!("router must be installed")
    };
    (subsystem, router)
}

#[test]
fn longest_pattern_wins_with_params() {
    let (_subsystem, router) = built_router();
    assert!(router
        .register("user/{id}", |_msg, _params: &RouteParams| Ok(Some(json!("short"))))
        .is_ok());
    assert!(router
        .register("user/{id}/profile", |_msg, params: &RouteParams| {
            Ok(Some(json!({ "id": params.get("id") })))
        })
        .is_ok());

    let Ok(matched) = router.match_path("user/123/profile") else {
        unreachable!("path must match")
    };
    assert_eq!(matched.pattern, "user/{id}/profile");
    assert_eq!(matched.params.get("id").map(String::as_str), Some("123"));

    let msg = Envelope::new("user/123/profile", Value::Null);
    let reply = router.route(&msg);
    assert!(matches!(reply, Ok(Some(v)) if v["id"] == "123"));
}

#[test]
fn register_unregister_register_leaves_no_state() {
    let (_subsystem, router) = built_router();
    assert!(router
        .register("a/path", |_msg, _params: &RouteParams| Ok(Some(json!("first"))))
        .is_ok());
    let msg = Envelope::new("a/path", Value::Null);
    assert!(matches!(router.route(&msg), Ok(Some(v)) if v == json!("first")));

    assert!(router.unregister("a/path").is_ok());
    assert!(matches!(
        router.route(&msg),
        Err(RouterError::NoRoute { .. })
    ));

    assert!(router
        .register("a/path", |_msg, _params: &RouteParams| Ok(Some(json!("second"))))
        .is_ok());
    assert!(matches!(router.route(&msg), Ok(Some(v)) if v == json!("second")));
    assert_eq!(router.len(), 1);
}

#[test]
fn wildcard_routes_capture_the_joined_tail() {
    let (_subsystem, router) = built_router();
    assert!(router
        .register("files/*", |_msg, params: &RouteParams| {
            Ok(Some(json!({ "tail": params.get("*") })))
        })
        .is_ok());

    let msg = Envelope::new("files/docs/2024/report.txt", Value::Null);
    let reply = router.route(&msg);
    assert!(matches!(reply, Ok(Some(v)) if v["tail"] == "docs/2024/report.txt"));
}

#[test]
fn literal_beats_param_at_equal_length() {
    let (_subsystem, router) = built_router();
    assert!(router
        .register("user/{id}", |_msg, _params: &RouteParams| Ok(Some(json!("param"))))
        .is_ok());
    assert!(router
        .register("user/admin", |_msg, _params: &RouteParams| Ok(Some(json!("literal"))))
        .is_ok());

    let Ok(matched) = router.match_path("user/admin") else {
        unreachable!("path must match")
    };
    assert_eq!(matched.pattern, "user/admin");

    let Ok(other) = router.match_path("user/guest") else {
        unreachable!("path must match")
    };
    assert_eq!(other.pattern, "user/{id}");
}

#[test]
fn router_cache_capacity_is_configurable() {
    let mut subsystem = Subsystem::new("tight-cache");
    subsystem.with_config(json!({"router": {"cacheCapacity": 1}}));
    if let Err(err) = subsystem.build(None) {
        unreachable!("configured build must succeed: {err}");
    }
    let Some(router) = subsystem.router() else {
        unreachable!("router must be installed")
    };
    assert!(router
        .register("a/{x}", |_msg, _params: &RouteParams| Ok(None))
        .is_ok());

    assert!(router.match_path("a/1").is_ok());
    assert!(router.match_path("a/2").is_ok());
    assert_eq!(router.cache_len(), 1, "cache must hold a single entry");
}
