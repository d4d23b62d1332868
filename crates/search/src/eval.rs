//! Time-sliced evaluation over the flattened row list.
//!
//! A search never blocks the host loop: [`SearchTask`] holds resumable
//! cursor state over a snapshot of the visible rows and does bounded
//! wall-clock work per call to [`SearchTask::run_slice`]. A compound
//! boolean query evaluates each leaf as its own full pass producing a
//! node-to-row-index map; the maps are combined once every pass finished
//! (AND keeps the left index of the intersection, OR unions preferring the
//! left index).

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::warn;

use tracelens_tree::{NodeId, NodeValue, TraceTree};

use crate::expr::{Op, QueryValue, SearchExpr};

/// Ranked search output.
#[derive(Debug, Default, Clone)]
pub struct SearchResults {
    /// Matching nodes, in visible-row order.
    pub matches: Vec<NodeId>,
    /// Node to rank (position in `matches`).
    pub rank: FxHashMap<NodeId, usize>,
}

/// What one slice accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// More rows remain; call `run_slice` again.
    Pending,
    /// Every pass finished; results are ready.
    Done,
}

/// One leaf sub-expression scanned over the full row snapshot.
struct LeafPass {
    expr: SearchExpr,
    cursor: usize,
    found: FxHashMap<NodeId, usize>,
}

/// Resumable evaluation of one query against one tree.
pub struct SearchTask<'t> {
    tree: &'t TraceTree,
    rows: Vec<NodeId>,
    passes: Vec<LeafPass>,
    current: usize,
    shape: SearchExpr,
}

impl<'t> SearchTask<'t> {
    /// Set up evaluation of `expr` over a snapshot of the tree's current
    /// visible rows. Rows added or removed after this point are not seen.
    pub fn new(tree: &'t TraceTree, expr: SearchExpr) -> Self {
        let mut passes = Vec::new();
        collect_leaves(&expr, &mut passes);
        Self {
            tree,
            rows: tree.list().to_vec(),
            passes,
            current: 0,
            shape: expr,
        }
    }

    /// Do at most `budget` of wall-clock work. Returns [`SliceOutcome::Done`]
    /// once every leaf pass has scanned the snapshot.
    pub fn run_slice(&mut self, budget: Duration) -> SliceOutcome {
        let deadline = Instant::now() + budget;
        while self.current < self.passes.len() {
            let pass = &mut self.passes[self.current];
            while pass.cursor < self.rows.len() {
                let id = self.rows[pass.cursor];
                if matches_leaf(self.tree, id, &pass.expr) {
                    pass.found.insert(id, pass.cursor);
                }
                pass.cursor += 1;
                if Instant::now() >= deadline {
                    return if self.finished() { SliceOutcome::Done } else { SliceOutcome::Pending };
                }
            }
            self.current += 1;
        }
        SliceOutcome::Done
    }

    fn finished(&self) -> bool {
        self.current >= self.passes.len()
            || (self.current == self.passes.len() - 1
                && self.passes[self.current].cursor >= self.rows.len())
    }

    /// Combine the finished passes into ranked results.
    ///
    /// Call after `run_slice` reported [`SliceOutcome::Done`].
    pub fn results(&self) -> SearchResults {
        let mut next = 0;
        let by_index = combine(&self.shape, &self.passes, &mut next);

        let mut ordered: Vec<(NodeId, usize)> = by_index.into_iter().collect();
        ordered.sort_by_key(|&(_, index)| index);

        let mut results = SearchResults::default();
        for (rank, (node, _)) in ordered.into_iter().enumerate() {
            results.rank.insert(node, rank);
            results.matches.push(node);
        }
        results
    }

    /// Drive slices to completion, yielding to the scheduler between quanta.
    pub async fn execute(mut self, budget: Duration) -> SearchResults {
        while self.run_slice(budget) == SliceOutcome::Pending {
            tokio::task::yield_now().await;
        }
        self.results()
    }
}

fn collect_leaves(expr: &SearchExpr, passes: &mut Vec<LeafPass>) {
    match expr {
        SearchExpr::And(lhs, rhs) | SearchExpr::Or(lhs, rhs) => {
            collect_leaves(lhs, passes);
            collect_leaves(rhs, passes);
        }
        leaf => passes.push(LeafPass {
            expr: leaf.clone(),
            cursor: 0,
            found: FxHashMap::default(),
        }),
    }
}

fn combine(
    expr: &SearchExpr,
    passes: &[LeafPass],
    next: &mut usize,
) -> FxHashMap<NodeId, usize> {
    match expr {
        SearchExpr::And(lhs, rhs) => {
            let mut left = combine(lhs, passes, next);
            let right = combine(rhs, passes, next);
            left.retain(|node, _| right.contains_key(node));
            left
        }
        SearchExpr::Or(lhs, rhs) => {
            let mut left = combine(lhs, passes, next);
            for (node, index) in combine(rhs, passes, next) {
                left.entry(node).or_insert(index);
            }
            left
        }
        _ => {
            let found = passes[*next].found.clone();
            *next += 1;
            found
        }
    }
}

// ---------------------------------------------------------------------
// Leaf matching
// ---------------------------------------------------------------------

fn matches_leaf(tree: &TraceTree, id: NodeId, expr: &SearchExpr) -> bool {
    match expr {
        SearchExpr::Free(text) => matches_free_text(tree, id, text),
        SearchExpr::Filter { key, op, value } => matches_filter(tree, id, key, *op, value),
        SearchExpr::And(..) | SearchExpr::Or(..) => {
            // Compounds are split into leaf passes before evaluation.
            debug_assert!(false, "compound expression reached leaf matching");
            false
        }
    }
}

fn matches_free_text(tree: &TraceTree, id: NodeId, text: &str) -> bool {
    let needle = text.to_lowercase();
    let node = tree.node(id);
    let contains = |hay: &str| hay.to_lowercase().contains(&needle);
    match &node.value {
        NodeValue::Transaction(txn) => {
            contains(&txn.op) || contains(&txn.transaction) || txn.event_id.as_str() == text
        }
        NodeValue::Span(span) => {
            span.op.as_deref().map(contains).unwrap_or(false)
                || span.description.as_deref().map(contains).unwrap_or(false)
                || span.span_id.as_str() == text
        }
        NodeValue::TraceError(error) => {
            contains(&error.title) || error.event_id.as_str() == text
        }
        _ => false,
    }
}

fn matches_filter(tree: &TraceTree, id: NodeId, key: &str, op: Op, value: &QueryValue) -> bool {
    if key == "has" {
        return matches_has(tree, id, op, value);
    }
    let Some(field) = resolve_field(tree, id, key) else {
        return false;
    };
    match (field, value) {
        (FieldValue::Number(have), QueryValue::Number(want))
        | (FieldValue::Number(have), QueryValue::DurationMs(want)) => compare(op, have, *want),
        (FieldValue::Text(have), QueryValue::Text(want)) => match op {
            Op::Eq => have == *want,
            Op::Ne => have != *want,
            _ => {
                warn!(key, "ordering comparison on a text field fails closed");
                false
            }
        },
        (have, want) => {
            warn!(key, ?have, ?want, "unsupported field/value combination fails closed");
            false
        }
    }
}

fn matches_has(tree: &TraceTree, id: NodeId, op: Op, value: &QueryValue) -> bool {
    let QueryValue::Text(what) = value else {
        return false;
    };
    let node = tree.node(id);
    let present = match what.as_str() {
        "error" => !node.errors.is_empty(),
        "issue" => !node.performance_issues.is_empty(),
        "profile" => !node.profiles.is_empty(),
        other => {
            warn!(predicate = other, "unknown has: predicate fails closed");
            return false;
        }
    };
    match op {
        Op::Eq => present,
        Op::Ne => !present,
        _ => false,
    }
}

fn compare(op: Op, have: f64, want: f64) -> bool {
    match op {
        Op::Gt => have > want,
        Op::Gte => have >= want,
        Op::Lt => have < want,
        Op::Lte => have <= want,
        Op::Eq => have == want,
        Op::Ne => have != want,
    }
}

#[derive(Debug)]
enum FieldValue {
    Number(f64),
    Text(String),
}

/// Resolve `key` on the node, in milliseconds for the duration aliases.
///
/// The duration and self-time families read the node's `space` rather than
/// the raw payload, so they stay correct after clock-skew adjustments and
/// bound widening.
fn resolve_field(tree: &TraceTree, id: NodeId, key: &str) -> Option<FieldValue> {
    let node = tree.node(id);
    match (key, &node.value) {
        ("transaction.duration" | "transaction.total_time", NodeValue::Transaction(_)) => {
            Some(FieldValue::Number(node.space.duration))
        }
        ("span.duration" | "span.total_time", NodeValue::Span(_)) => {
            Some(FieldValue::Number(node.space.duration))
        }
        ("span.self_time" | "span.exclusive_time", NodeValue::Span(_)) => {
            let child_time: f64 = tree
                .children_of(id)
                .into_iter()
                .filter(|&c| matches!(tree.node(c).value, NodeValue::Span(_)))
                .map(|c| tree.node(c).space.duration)
                .sum();
            Some(FieldValue::Number((node.space.duration - child_time).max(0.0)))
        }
        ("op" | "transaction.op", _) => node.op().map(|op| FieldValue::Text(op.to_string())),
        ("transaction", NodeValue::Transaction(txn)) => {
            Some(FieldValue::Text(txn.transaction.clone()))
        }
        ("description", NodeValue::Span(span)) => {
            span.description.clone().map(FieldValue::Text)
        }
        _ => extra_field(&node.value, key),
    }
}

/// Fall back to the payload's passthrough map.
fn extra_field(value: &NodeValue, key: &str) -> Option<FieldValue> {
    let extra = match value {
        NodeValue::Transaction(txn) => &txn.extra,
        NodeValue::Span(span) => &span.extra,
        NodeValue::TraceError(error) => &error.extra,
        _ => return None,
    };
    match extra.get(key)? {
        serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
        serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
        serde_json::Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
        _ => None,
    }
}
