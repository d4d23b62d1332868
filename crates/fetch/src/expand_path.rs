//! Deep-link replay.
//!
//! A node path captured by `path_to_node` is replayed against a possibly
//! rebuilt tree: every ancestor transaction is expanded and zoomed (fetching
//! spans where needed), then the leaf is located by its stable identifier
//! and scrolled to by list index.

use parking_lot::Mutex;

use tracelens_tree::{NodeId, NodePath, TraceTree};

use crate::error::{FetchError, Result};
use crate::zoom::ZoomController;

/// A node located by path replay, with its row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedNode {
    /// Position in the flattened visible list.
    pub index: usize,
    /// The node itself.
    pub node: NodeId,
}

/// Replay `path` (leaf-first, as produced by `path_to_node`) against `tree`.
///
/// Resolves to `None` when any anchor no longer exists; fetch failures along
/// the way are surfaced.
pub async fn expand_to_path(
    tree: &Mutex<TraceTree>,
    path: &[NodePath],
    zoom: &ZoomController,
) -> Result<Option<LocatedNode>> {
    let Some(leaf) = path.first() else {
        return Ok(None);
    };

    // Walk the ancestor transactions root-ward so every fetch anchor on the
    // way down has its spans merged before we look for the leaf.
    for segment in path.iter().skip(1).rev() {
        // Only transactions carry a fetch; autogroup anchors on the path are
        // opened by the visual-parent expansion below.
        let NodePath::Transaction(event_id) = segment else {
            continue;
        };
        let found = tree.lock().find_transaction(event_id);
        let Some(anchor) = found else {
            return Ok(None);
        };
        tree.lock().expand(anchor, true);
        match zoom.zoom_in(tree, anchor, true).await {
            Ok(_) => {}
            // A leaf transaction with nothing to fetch is still addressable.
            Err(FetchError::NotFetchable) => {}
            Err(err) => return Err(err),
        }
    }

    let mut guard = tree.lock();
    let target = locate_leaf(&guard, path, leaf);
    let Some(target) = target else {
        return Ok(None);
    };

    // Open everything above the target so it lands in the visible list.
    let mut ancestors = Vec::new();
    let mut cursor = guard.visual_parent(target);
    while let Some(ancestor) = cursor {
        ancestors.push(ancestor);
        cursor = guard.visual_parent(ancestor);
    }
    for ancestor in ancestors.into_iter().rev() {
        guard.expand(ancestor, true);
    }

    Ok(guard
        .index_in_list(target)
        .map(|index| LocatedNode { index, node: target }))
}

fn locate_leaf(tree: &TraceTree, path: &[NodePath], leaf: &NodePath) -> Option<NodeId> {
    match leaf {
        NodePath::TraceRoot => Some(tree.trace_root()),
        NodePath::Transaction(event_id) => tree.find_transaction(event_id),
        NodePath::Error(event_id) => tree.find_error(event_id),
        NodePath::Autogroup(anchor) => tree.find_autogroup(anchor),
        NodePath::MissingInstrumentation(anchor) => tree.find_missing_instrumentation(anchor),
        NodePath::Span(span_id) => {
            // Search under the nearest transaction anchor when the path has
            // one, falling back to the whole tree.
            let scope = path.iter().skip(1).find_map(|segment| match segment {
                NodePath::Transaction(event_id) => tree.find_transaction(event_id),
                _ => None,
            });
            tree.find_span_in_subtree(scope.unwrap_or_else(|| tree.root()), span_id)
        }
    }
}
