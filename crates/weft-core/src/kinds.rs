// SPDX-License-Identifier: Apache-2.0

//! Canonical facet kind names.
//!
//! Every default hook produces a facet whose kind appears in [`FACET_KINDS`].
//! User hooks may introduce arbitrary kinds; these constants only pin down the
//! vocabulary the default sets rely on.

/// Child-subsystem registry facet.
pub const HIERARCHY: &str = "hierarchy";
/// Pattern router facet.
pub const ROUTER: &str = "router";
/// Message processor facet.
pub const PROCESSOR: &str = "processor";
/// Priority queue facet.
pub const QUEUE: &str = "queue";
/// Cooperative time-sliced scheduler facet.
pub const SCHEDULER: &str = "scheduler";
/// Event listener registry facet.
pub const LISTENERS: &str = "listeners";
/// Counter statistics facet.
pub const STATISTICS: &str = "statistics";
/// Inline (queue-bypassing) processing facet.
pub const SYNCHRONOUS: &str = "synchronous";
/// Query bookkeeping facet.
pub const QUERIES: &str = "queries";

/// The full set of canonical facet kinds.
pub const FACET_KINDS: [&str; 9] = [
    HIERARCHY, ROUTER, PROCESSOR, QUEUE, SCHEDULER, LISTENERS, STATISTICS, SYNCHRONOUS, QUERIES,
];

/// Returns true when `kind` names one of the canonical facets.
#[must_use]
pub fn is_canonical(kind: &str) -> bool {
    FACET_KINDS.contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_kinds_are_unique() {
        for (i, a) in FACET_KINDS.iter().enumerate() {
            for b in &FACET_KINDS[i + 1..] {
                assert_ne!(a, b, "duplicate canonical kind {a}");
            }
        }
    }

    #[test]
    fn is_canonical_rejects_unknown_kinds() {
        assert!(is_canonical(ROUTER));
        assert!(!is_canonical("transmogrifier"));
    }
}
