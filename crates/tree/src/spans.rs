//! Span/transaction merge: populating a node's span children from a fetched
//! event payload.
//!
//! Inputs are the zoom target, the event payload, and its spans already
//! sorted by start timestamp. Existing transaction children of the target
//! are re-attached (as structural copies) under whichever span matches their
//! declared `parent_span_id`; the originals stay in place so zoom-out can
//! restore the transaction view without a re-fetch.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use tracelens_core::{CoreError, EventPayload, Policy, RawSpan, TraceSpace};

use crate::node::{Node, NodeId, NodeValue, ReparentReason};
use crate::transforms;
use crate::tree::TraceTree;

/// Sentinel partition key for transactions with no declared parent span.
const NO_PARENT_SPAN: &str = "\u{0}no-parent-span";

/// Merge `spans` into the tree under `parent`.
///
/// Returns the observed `(min, max)` span timestamps in seconds so the
/// caller can widen the trace bounds, or `None` when the parent already has
/// span children (idempotent re-entry) or no span carried timestamps. An
/// empty span list still runs the fallback re-attachment, so nested
/// transactions stay visible in the zoomed view.
pub(crate) fn from_spans(
    tree: &mut TraceTree,
    parent: NodeId,
    event: &EventPayload,
    spans: &[RawSpan],
    policy: &Policy,
) -> Result<Option<(f64, f64)>, CoreError> {
    if !tree.node(parent).span_children.is_empty() {
        return Ok(None);
    }

    let gap_excluded = policy.sdk_excluded_from_gaps(event.sdk_name.as_deref());

    // span_id -> placed node, seeded with the parent itself for nested zoom.
    let mut lookup: FxHashMap<String, NodeId> = FxHashMap::default();
    if let Some(span_id) = tree.node(parent).span_id() {
        lookup.insert(span_id.as_str().to_string(), parent);
    }

    // Transactions currently nested under `parent`, keyed by the span they
    // claim as their parent.
    let mut pending_txns: FxHashMap<String, Vec<NodeId>> = FxHashMap::default();
    for &child in &tree.node(parent).children {
        if let NodeValue::Transaction(t) = &tree.node(child).value {
            let key = t
                .parent_span_id
                .as_ref()
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| NO_PARENT_SPAN.to_string());
            pending_txns.entry(key).or_default().push(child);
        }
    }

    // Embedded issue/error lists of the owning transaction, used to attach
    // occurrences to the specific spans they happened in.
    let owning_txn = nearest_transaction(tree, parent);
    let (txn_errors, txn_issues) = match owning_txn.map(|id| &tree.node(id).value) {
        Some(NodeValue::Transaction(t)) => (t.errors.clone(), t.performance_issues.clone()),
        _ => (Vec::new(), Vec::new()),
    };

    let mut min_s = f64::INFINITY;
    let mut max_s = f64::NEG_INFINITY;
    let mut browser_request: Option<NodeId> = None;

    for raw in spans {
        let has_child_txns = pending_txns.contains_key(raw.span_id.as_str());
        let mut node = Node::from_span(raw, None, event.sdk_name.as_deref(), has_child_txns, policy);

        for error in &txn_errors {
            if error.span.as_ref() == Some(&raw.span_id) {
                node.push_error(error.clone());
            }
        }
        for issue in &txn_issues {
            if issue.span.contains(&raw.span_id) || issue.suspect_spans.contains(&raw.span_id) {
                node.push_performance_issue(issue.clone());
            }
        }

        if let Some(s) = raw.start_timestamp {
            min_s = min_s.min(s);
            max_s = max_s.max(s);
        }
        if let Some(e) = raw.timestamp {
            max_s = max_s.max(e);
        }

        let id = tree.push_node(node);

        let attach_under = raw
            .parent_span_id
            .as_ref()
            .and_then(|p| lookup.get(p.as_str()).copied());
        match attach_under {
            Some(owner) => attach_span(tree, owner, id, gap_excluded, policy),
            None => attach_span(tree, parent, id, gap_excluded, policy),
        }

        if is_browser_request(raw) && browser_request.is_none() {
            browser_request = Some(id);
        }

        lookup.insert(raw.span_id.as_str().to_string(), id);

        // Re-attach nested transactions that claimed this span as parent.
        if let Some(txns) = pending_txns.remove(raw.span_id.as_str()) {
            for txn in txns {
                let clone = clone_transaction_subtree(tree, txn, id);
                tree.node_mut(id).children.push(clone);
            }
        }
    }

    // Leftovers: the SSR server handler moves under the browser request
    // span; everything else falls back to the top-level parent.
    for (key, txns) in pending_txns.drain() {
        for txn in txns {
            let reparent = tree.node(txn).reparent_reason
                == Some(ReparentReason::PageloadServerHandler);
            if reparent {
                if let Some(target) = browser_request {
                    let clone = clone_transaction_subtree(tree, txn, target);
                    tree.node_mut(target).children.push(clone);
                    tree.node_mut(txn).reparent_reason = None;
                    continue;
                }
            }
            if key != NO_PARENT_SPAN {
                warn!(
                    parent_span_id = key.as_str(),
                    "transaction parent_span_id matched no fetched span; attaching under zoom target"
                );
            } else {
                debug!("transaction without parent_span_id attached under zoom target");
            }
            let clone = clone_transaction_subtree(tree, txn, parent);
            span_view_mut(tree, parent).push(clone);
        }
    }

    // Structural passes scoped to the freshly inserted subtree only.
    transforms::autogroup_direct_children_in(tree, parent, policy);
    transforms::autogroup_siblings_in(tree, parent, policy);

    if min_s.is_finite() && max_s.is_finite() {
        Ok(Some((min_s, max_s)))
    } else {
        Ok(None)
    }
}

/// The span-view child list of a node: `span_children` for transactions,
/// `children` otherwise.
fn span_view_mut(tree: &mut TraceTree, id: NodeId) -> &mut Vec<NodeId> {
    if matches!(tree.node(id).value, NodeValue::Transaction(_)) {
        &mut tree.node_mut(id).span_children
    } else {
        &mut tree.node_mut(id).children
    }
}

fn span_view(tree: &TraceTree, id: NodeId) -> &[NodeId] {
    if matches!(tree.node(id).value, NodeValue::Transaction(_)) {
        &tree.node(id).span_children
    } else {
        &tree.node(id).children
    }
}

/// Attach a span under `owner`, inserting a missing-instrumentation marker
/// when a qualifying gap separates it from the previously placed sibling
/// (or from the owning span itself when it is the first child).
fn attach_span(tree: &mut TraceTree, owner: NodeId, id: NodeId, gap_excluded: bool, policy: &Policy) {
    if !gap_excluded {
        let span_start = tree.node(id).space.start;
        let previous = span_view(tree, owner)
            .iter()
            .rev()
            .find(|&&c| tree.node(c).span_id().is_some())
            .copied()
            .or_else(|| {
                if span_view(tree, owner).is_empty() && tree.node(owner).span_id().is_some() {
                    Some(owner)
                } else {
                    None
                }
            });
        if let Some(previous) = previous {
            let gap = span_start - tree.node(previous).space.end();
            if gap > policy.missing_instrumentation_gap_ms {
                let mut marker = Node::new(
                    NodeValue::MissingInstrumentation { previous, next: id, gap_ms: gap },
                    Some(owner),
                );
                marker.space = TraceSpace::new(tree.node(previous).space.end(), gap);
                let marker_id = tree.push_node(marker);
                span_view_mut(tree, owner).push(marker_id);
            }
        }
    }
    tree.node_mut(id).parent = Some(owner);
    span_view_mut(tree, owner).push(id);
}

fn is_browser_request(raw: &RawSpan) -> bool {
    match raw.op.as_deref() {
        Some("browser.request") => true,
        Some("browser") => raw.description.as_deref() == Some("request"),
        _ => false,
    }
}

/// Nearest transaction at or above `id`.
fn nearest_transaction(tree: &TraceTree, id: NodeId) -> Option<NodeId> {
    let mut cur = Some(id);
    while let Some(n) = cur {
        if matches!(tree.node(n).value, NodeValue::Transaction(_)) {
            return Some(n);
        }
        cur = tree.node(n).parent;
    }
    None
}

/// Structural copy of a transaction subtree.
///
/// The copy participates in the span view; the original stays in the
/// transaction view so zoom-out is lossless. Copies remember their origin
/// for staleness lookups.
fn clone_transaction_subtree(tree: &mut TraceTree, src: NodeId, new_parent: NodeId) -> NodeId {
    let root_clone = clone_node(tree, src, new_parent);
    let mut stack: Vec<(NodeId, NodeId)> = Vec::new();
    for &c in tree.node(src).children.clone().iter().rev() {
        stack.push((c, root_clone));
    }
    while let Some((s, cloned_parent)) = stack.pop() {
        let id = clone_node(tree, s, cloned_parent);
        tree.node_mut(cloned_parent).children.push(id);
        for &c in tree.node(s).children.clone().iter().rev() {
            stack.push((c, id));
        }
    }
    root_clone
}

fn clone_node(tree: &mut TraceTree, src: NodeId, parent: NodeId) -> NodeId {
    let source = tree.node(src);
    let mut node = Node::new(source.value.clone(), Some(parent));
    node.expanded = source.expanded;
    node.can_fetch = source.can_fetch;
    node.space = source.space;
    node.errors = source.errors.clone();
    node.performance_issues = source.performance_issues.clone();
    node.profiles = source.profiles.clone();
    node.metadata = source.metadata.clone();
    node.sdk_name = source.sdk_name.clone();
    node.cloned_from = Some(src);
    tree.push_node(node)
}
