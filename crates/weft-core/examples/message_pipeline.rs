// SPDX-License-Identifier: Apache-2.0
//! Builds a canonical subsystem, registers a couple of routes, accepts a
//! batch of messages, and drains one scheduler slice.
//!
//! Run with `cargo run --example message_pipeline`.
#![allow(clippy::print_stdout)]

use std::time::Duration;

use serde_json::{json, Value};
use weft_core::{Envelope, RouteParams, Subsystem};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut subsystem = Subsystem::new("demo");
    subsystem.with_config(json!({
        "scheduler": { "maxMessagesPerSlice": 8 },
        "router": { "cacheCapacity": 64 },
    }));
    subsystem.build(None)?;

    let router = subsystem.router().ok_or("router facet missing")?;
    router.register("greet/{name}", |_msg, params: &RouteParams| {
        Ok(Some(json!({ "hello": params.get("name") })))
    })?;
    router.register("audit/*", |_msg, params: &RouteParams| {
        Ok(Some(json!({ "entry": params.get("*") })))
    })?;

    for name in ["ada", "grace", "edsger"] {
        subsystem.accept(Envelope::new(format!("greet/{name}"), Value::Null).shared());
    }
    subsystem.accept(Envelope::new("audit/login/2024", Value::Null).shared());

    let report = subsystem
        .process(Duration::from_millis(50))
        .ok_or("scheduler facet missing")?;
    println!(
        "drained {} messages ({} errors) in {:?}",
        report.processed, report.errors, report.processing_time
    );

    let query = Envelope::query("greet/lin", Value::Null).shared();
    subsystem.accept(query.clone());
    let _ = subsystem.process(Duration::from_millis(10));
    println!("query reply: {:?}", query.query_result());

    if let Some(stats) = subsystem.statistics() {
        let mut counters: Vec<(String, u64)> = stats.snapshot().into_iter().collect();
        counters.sort();
        for (counter, value) in counters {
            println!("{counter}: {value}");
        }
    }
    Ok(())
}
