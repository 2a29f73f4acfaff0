// SPDX-License-Identifier: Apache-2.0

//! Property tests for queue ordering and plan topology.

use proptest::prelude::*;
use serde_json::Value;
use weft_core::{
    Envelope, EnqueueOptions, Facet, Hook, HookMeta, Message as _, MessageQueue, SharedMessage,
    Subsystem,
};

fn msg(tag: usize) -> SharedMessage {
    Envelope::new(format!("m/{tag}"), Value::Null).shared()
}

proptest! {
    #[test]
    fn queue_drains_priority_desc_then_seq_asc(priorities in proptest::collection::vec(0_u32..5, 1..40)) {
        let queue = MessageQueue::new();
        for (i, &priority) in priorities.iter().enumerate() {
            prop_assert!(queue.enqueue(msg(i), EnqueueOptions::with_priority(priority)).is_ok());
        }

        let mut drained: Vec<(u32, usize)> = Vec::new();
        while let Some(entry) = queue.dequeue() {
            let tag: usize = entry.msg.path()[2..].parse().unwrap_or(usize::MAX);
            drained.push((entry.options.priority, tag));
        }

        prop_assert_eq!(drained.len(), priorities.len());
        for window in drained.windows(2) {
            let (p1, s1) = window[0];
            let (p2, s2) = window[1];
            prop_assert!(
                p1 > p2 || (p1 == p2 && s1 < s2),
                "entries must drain (priority desc, seq asc): {:?}",
                window
            );
        }
    }

    #[test]
    fn planned_order_places_dependencies_first(edge_bits in proptest::collection::vec(any::<bool>(), 28)) {
        // Random DAG over eight kinds: an edge may only point from a later
        // kind to an earlier one, which guarantees acyclicity.
        let names: Vec<String> = (0..8).map(|i| format!("k{i}")).collect();
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut bit = 0;
        for to in 0..8_usize {
            for from in (to + 1)..8 {
                if edge_bits.get(bit).copied().unwrap_or(false) {
                    edges.push((from, to));
                }
                bit += 1;
            }
        }

        let mut subsystem = Subsystem::new("props");
        subsystem.default_hooks_mut().clear();
        for (i, name) in names.iter().enumerate() {
            let required: Vec<String> = edges
                .iter()
                .filter(|(from, _)| *from == i)
                .map(|(_, to)| names[*to].clone())
                .collect();
            let meta = HookMeta::new(name.clone()).required(required).source("props");
            subsystem.add_hook(Hook::new(meta.clone(), move |_| Facet::from_meta(&meta)));
        }

        let plan = subsystem.plan(None);
        prop_assert!(plan.is_ok(), "acyclic hook sets must plan");
        let Ok(plan) = plan else { unreachable!() };
        let position = |kind: &str| plan.ordered_kinds.iter().position(|k| k == kind);
        for (from, to) in &edges {
            let dependent = position(&names[*from]);
            let dependency = position(&names[*to]);
            prop_assert!(
                dependency < dependent,
                "dependency {} must precede {}",
                names[*to],
                names[*from]
            );
        }
    }
}
