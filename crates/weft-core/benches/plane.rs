// SPDX-License-Identifier: Apache-2.0
//! Hot-path benchmarks for the message plane: cached and cold route
//! matching, and queue churn under mixed priorities.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::Value;
use weft_core::{Envelope, EnqueueOptions, MessageQueue, RouteParams, Router, RouterConfig};

fn populated_router(config: &RouterConfig) -> Router {
    let router = Router::with_config(config);
    for i in 0..100 {
        let _ = router.register(&format!("svc{i}/{{id}}/detail"), |_m, _p: &RouteParams| Ok(None));
        let _ = router.register(&format!("svc{i}/static/page"), |_m, _p: &RouteParams| Ok(None));
    }
    let _ = router.register("files/*", |_m, _p: &RouteParams| Ok(None));
    router
}

fn bench_router(c: &mut Criterion) {
    let router = populated_router(&RouterConfig::default());
    c.bench_function("router_match_cached", |b| {
        b.iter(|| router.match_path(black_box("svc50/123/detail")));
    });

    // A one-entry cache forces the slow path on every alternating lookup.
    let cold = populated_router(&RouterConfig {
        cache_capacity: 1,
        debug: false,
    });
    let mut flip = false;
    c.bench_function("router_match_cold", |b| {
        b.iter(|| {
            flip = !flip;
            let path = if flip { "svc10/9/detail" } else { "svc90/9/detail" };
            cold.match_path(black_box(path))
        });
    });
}

fn bench_queue(c: &mut Criterion) {
    c.bench_function("queue_churn_mixed_priorities", |b| {
        let queue = MessageQueue::new();
        let messages: Vec<_> = (0..256_u32)
            .map(|i| Envelope::new(format!("m/{i}"), Value::Null).shared())
            .collect();
        b.iter(|| {
            for (i, msg) in messages.iter().enumerate() {
                let priority = u32::try_from(i % 7).unwrap_or(0);
                let _ = queue.enqueue(msg.clone(), EnqueueOptions::with_priority(priority));
            }
            while let Some(entry) = queue.dequeue() {
                black_box(entry);
            }
        });
    });
}

criterion_group!(benches, bench_router, bench_queue);
criterion_main!(benches);
