//! Structural policy constants.
//!
//! The thresholds that drive autogrouping and gap detection are product
//! policy, not algorithmic invariants, so they live in one configuration
//! struct that every pass takes by reference. Defaults carry the shipped
//! values.

use std::time::Duration;

/// Tunable constants for tree construction and mutation passes.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Minimum gap between two sibling spans, in milliseconds, before a
    /// missing-instrumentation marker is inserted.
    pub missing_instrumentation_gap_ms: f64,
    /// SDK name prefixes excluded from gap detection. Browser SDKs leave
    /// legitimate idle gaps that are not instrumentation bugs.
    pub gap_excluded_sdk_prefixes: Vec<String>,
    /// Minimum run length before consecutive same-op/description siblings
    /// collapse into a sibling autogroup.
    pub sibling_autogroup_min: usize,
    /// Minimum chain length before a linear chain of same-op spans collapses
    /// into a parent autogroup.
    pub parent_autogroup_min_chain: usize,
    /// Span operations that start collapsed by default (auto-instrumented
    /// low-level connection ops, noisy and rarely interesting).
    pub default_collapsed_ops: Vec<String>,
    /// Number of concurrent requests per backfill batch.
    pub backfill_batch_size: usize,
    /// Wall-clock budget for one synchronous search work slice.
    pub search_slice_budget: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            missing_instrumentation_gap_ms: 100.0,
            gap_excluded_sdk_prefixes: vec![
                "sentry.javascript.browser".to_string(),
                "sentry.javascript.react".to_string(),
                "sentry.javascript.nextjs".to_string(),
                "sentry.javascript.remix".to_string(),
                "sentry.javascript.vue".to_string(),
                "sentry.javascript.sveltekit".to_string(),
                "sentry.javascript.astro".to_string(),
            ],
            sibling_autogroup_min: 5,
            parent_autogroup_min_chain: 2,
            default_collapsed_ops: vec![
                "http.tcp.connect".to_string(),
                "http.connect".to_string(),
            ],
            backfill_batch_size: 3,
            search_slice_budget: Duration::from_millis(12),
        }
    }
}

impl Policy {
    /// Whether gap detection is suppressed for the given SDK name.
    pub fn sdk_excluded_from_gaps(&self, sdk_name: Option<&str>) -> bool {
        match sdk_name {
            Some(name) => self
                .gap_excluded_sdk_prefixes
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str())),
            None => false,
        }
    }

    /// Whether spans with this operation start collapsed.
    pub fn op_collapsed_by_default(&self, op: Option<&str>) -> bool {
        match op {
            Some(op) => self.default_collapsed_ops.iter().any(|o| o == op),
            None => false,
        }
    }
}
