//! Stable node paths.
//!
//! Positional indices do not survive zooming, autogrouping or a re-fetch, so
//! deep links address nodes through an ordered list of stable-identifier
//! segments instead. The segment grammar is persisted in URLs and must not
//! change: `txn-<event_id>`, `span-<span_id>`, `ag-<anchor_span_id>`,
//! `ms-<anchor_span_id>`, `error-<event_id>`, literal `trace-root`.

use std::fmt;
use std::str::FromStr;

use tracelens_core::{CoreError, EventId, SpanId};

use crate::node::{NodeId, NodeValue};
use crate::tree::TraceTree;

/// One segment of a node path, leaf-first in a serialized path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodePath {
    /// The virtual trace root row.
    TraceRoot,
    /// A transaction, addressed by event id.
    Transaction(EventId),
    /// A span, addressed by span id.
    Span(SpanId),
    /// An autogroup, addressed by its anchor span (chain head or first
    /// sibling member).
    Autogroup(SpanId),
    /// A gap marker, addressed by the span preceding it.
    MissingInstrumentation(SpanId),
    /// An error row, addressed by event id.
    Error(EventId),
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePath::TraceRoot => f.write_str("trace-root"),
            NodePath::Transaction(id) => write!(f, "txn-{id}"),
            NodePath::Span(id) => write!(f, "span-{id}"),
            NodePath::Autogroup(id) => write!(f, "ag-{id}"),
            NodePath::MissingInstrumentation(id) => write!(f, "ms-{id}"),
            NodePath::Error(id) => write!(f, "error-{id}"),
        }
    }
}

impl FromStr for NodePath {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw == "trace-root" {
            return Ok(NodePath::TraceRoot);
        }
        let (prefix, rest) = raw
            .split_once('-')
            .ok_or_else(|| CoreError::InvalidPathSegment(raw.to_string()))?;
        if rest.is_empty() {
            return Err(CoreError::InvalidPathSegment(raw.to_string()));
        }
        match prefix {
            "txn" => Ok(NodePath::Transaction(rest.into())),
            "span" => Ok(NodePath::Span(rest.into())),
            "ag" => Ok(NodePath::Autogroup(rest.into())),
            "ms" => Ok(NodePath::MissingInstrumentation(rest.into())),
            "error" => Ok(NodePath::Error(rest.into())),
            _ => Err(CoreError::InvalidPathSegment(raw.to_string())),
        }
    }
}

/// The segment a node contributes when it is the addressed leaf.
fn own_segment(tree: &TraceTree, id: NodeId) -> Option<NodePath> {
    let node = tree.node(id);
    match &node.value {
        NodeValue::Root | NodeValue::Trace => Some(NodePath::TraceRoot),
        NodeValue::Transaction(txn) => Some(NodePath::Transaction(txn.event_id.clone())),
        NodeValue::Span(span) => Some(NodePath::Span(span.span_id.clone())),
        NodeValue::ParentAutogroup { head, .. } => {
            tree.node(*head).span_id().cloned().map(NodePath::Autogroup)
        }
        NodeValue::SiblingAutogroup { .. } => {
            let first = node.children.first()?;
            tree.node(*first).span_id().cloned().map(NodePath::Autogroup)
        }
        NodeValue::MissingInstrumentation { previous, .. } => tree
            .node(*previous)
            .span_id()
            .cloned()
            .map(NodePath::MissingInstrumentation),
        NodeValue::TraceError(error) => Some(NodePath::Error(error.event_id.clone())),
        NodeValue::Collapsed { .. } => None,
    }
}

/// Minimal leaf-first segment list re-locating `id` after a rebuild.
///
/// Plain span ancestors are transparent for addressing: the climb records
/// the target's own segment, each enclosing autogroup anchor, and each
/// transaction ancestor. Transactions are the fetch anchors a replay has to
/// zoom through; autogroup segments carry no fetch but keep the path aligned
/// with the visible grouping boundaries.
pub fn path_to_node(tree: &TraceTree, id: NodeId) -> Vec<NodePath> {
    let mut segments = Vec::new();
    if let Some(own) = own_segment(tree, id) {
        let is_root = own == NodePath::TraceRoot;
        segments.push(own);
        if is_root {
            return segments;
        }
    }

    let mut cursor = tree.node(id).parent;
    while let Some(ancestor) = cursor {
        match &tree.node(ancestor).value {
            NodeValue::Transaction(_)
            | NodeValue::ParentAutogroup { .. }
            | NodeValue::SiblingAutogroup { .. } => {
                if let Some(segment) = own_segment(tree, ancestor) {
                    segments.push(segment);
                }
            }
            _ => {}
        }
        cursor = tree.node(ancestor).parent;
    }
    segments
}
