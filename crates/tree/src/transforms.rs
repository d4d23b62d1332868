//! Structural transform passes.
//!
//! Pure tree-rewriting algorithms operated by the tree: parent-chain
//! autogrouping, sibling autogrouping, missing-instrumentation detection and
//! removal, and the issues-view collapse. All passes are idempotent:
//! re-running one on an already-transformed tree is a no-op.
//!
//! The autogroup passes do not touch the flattened list (their callers
//! splice or rebuild); the missing-instrumentation and collapse passes
//! rebuild it, since they are invoked as standalone preference toggles.

use rustc_hash::FxHashMap;
use tracelens_core::{Policy, TraceSpace};

use crate::node::{Node, NodeId, NodeValue};
use crate::tree::TraceTree;

/// Replace `old` with `new` wherever `parent` owns it.
fn replace_child(tree: &mut TraceTree, parent: NodeId, old: NodeId, new: NodeId) {
    let node = tree.node_mut(parent);
    if let Some(pos) = node.children.iter().position(|&c| c == old) {
        node.children[pos] = new;
        return;
    }
    if let Some(pos) = node.span_children.iter().position(|&c| c == old) {
        node.span_children[pos] = new;
    }
}

// ---------------------------------------------------------------------
// Parent-chain autogrouping
// ---------------------------------------------------------------------

/// Collapse linear chains of same-operation spans across the whole tree.
pub fn autogroup_direct_children(tree: &mut TraceTree, policy: &Policy) {
    let root = tree.root();
    autogroup_direct_children_in(tree, root, policy);
}

/// Collapse chains within the subtree under `scope` only.
pub fn autogroup_direct_children_in(tree: &mut TraceTree, scope: NodeId, policy: &Policy) {
    let mut stack = vec![scope];
    while let Some(n) = stack.pop() {
        let node = tree.node(n);
        let candidate =
            matches!(node.value, NodeValue::Span(_)) && node.autogroup.is_none() && n != scope;
        if candidate {
            if let Some(chain) = collect_chain(tree, n, policy) {
                if let Some(&tail) = chain.last() {
                    build_parent_autogroup(tree, &chain);
                    stack.extend(tree.node(tail).children.iter().copied());
                    continue;
                }
            }
        }
        let node = tree.node(n);
        stack.extend(node.children.iter().copied());
        stack.extend(node.span_children.iter().copied());
        if let NodeValue::ParentAutogroup { head, .. } = node.value {
            stack.push(head);
        }
    }
}

/// Walk forward from `start` while the single child is a span with the
/// identical operation. Returns the chain (head..=tail) when it is long
/// enough to group.
fn collect_chain(tree: &TraceTree, start: NodeId, policy: &Policy) -> Option<Vec<NodeId>> {
    let op = match &tree.node(start).value {
        NodeValue::Span(s) => s.op.clone()?,
        _ => return None,
    };
    let mut chain = vec![start];
    let mut cur = start;
    loop {
        let kids = &tree.node(cur).children;
        if kids.len() != 1 {
            break;
        }
        let child = kids[0];
        let child_node = tree.node(child);
        let matches_op = match &child_node.value {
            NodeValue::Span(s) => s.op.as_deref() == Some(op.as_str()),
            _ => false,
        };
        if !matches_op || child_node.autogroup.is_some() {
            break;
        }
        chain.push(child);
        cur = child;
    }
    if chain.len() >= policy.parent_autogroup_min_chain {
        Some(chain)
    } else {
        None
    }
}

fn build_parent_autogroup(tree: &mut TraceTree, chain: &[NodeId]) -> Option<NodeId> {
    let head = chain[0];
    let tail = *chain.last()?;
    let parent = tree.node(head).parent?;

    let mut ag = Node::new(
        NodeValue::ParentAutogroup { head, tail, group_count: chain.len() },
        Some(parent),
    );
    ag.space = chain_space(tree, chain);
    for &member in chain {
        for error in tree.node(member).errors.clone() {
            ag.push_error(error);
        }
        for issue in tree.node(member).performance_issues.clone() {
            ag.push_performance_issue(issue);
        }
    }

    let ag = tree.push_node(ag);
    replace_child(tree, parent, head, ag);
    tree.node_mut(head).parent = Some(ag);
    for &member in chain {
        tree.node_mut(member).autogroup = Some(ag);
    }
    tree.invalidate_subtree(ag);
    Some(ag)
}

fn chain_space(tree: &TraceTree, members: &[NodeId]) -> TraceSpace {
    let mut start = f64::INFINITY;
    let mut end = f64::NEG_INFINITY;
    for &member in members {
        let space = tree.node(member).space;
        start = start.min(space.start);
        end = end.max(space.end());
    }
    if start.is_finite() && end.is_finite() {
        TraceSpace::new(start, end - start)
    } else {
        TraceSpace::ZERO
    }
}

// ---------------------------------------------------------------------
// Sibling autogrouping
// ---------------------------------------------------------------------

/// Collapse runs of identical childless sibling spans across the whole tree.
pub fn autogroup_siblings(tree: &mut TraceTree, policy: &Policy) {
    let root = tree.root();
    autogroup_siblings_in(tree, root, policy);
}

/// Collapse sibling runs within the subtree under `scope` only.
pub fn autogroup_siblings_in(tree: &mut TraceTree, scope: NodeId, policy: &Policy) {
    let mut stack = vec![scope];
    while let Some(n) = stack.pop() {
        // Never regroup inside an existing group.
        if matches!(tree.node(n).value, NodeValue::SiblingAutogroup { .. }) {
            continue;
        }
        group_sibling_runs(tree, n, false, policy);
        group_sibling_runs(tree, n, true, policy);

        let node = tree.node(n);
        stack.extend(node.children.iter().copied());
        stack.extend(node.span_children.iter().copied());
        if let NodeValue::ParentAutogroup { head, .. } = node.value {
            stack.push(head);
        }
    }
}

fn sibling_key(tree: &TraceTree, id: NodeId) -> Option<(String, String)> {
    let node = tree.node(id);
    if !node.children.is_empty() || !node.span_children.is_empty() || node.autogroup.is_some() {
        return None;
    }
    match &node.value {
        NodeValue::Span(s) => {
            let op = s.op.clone()?;
            let description = s
                .description
                .clone()
                .or_else(|| s.extra.get("name").and_then(|v| v.as_str()).map(String::from))
                .unwrap_or_default();
            Some((op, description))
        }
        _ => None,
    }
}

fn group_sibling_runs(tree: &mut TraceTree, owner: NodeId, span_view: bool, policy: &Policy) {
    let list: Vec<NodeId> = if span_view {
        tree.node(owner).span_children.clone()
    } else {
        tree.node(owner).children.clone()
    };
    if list.len() < policy.sibling_autogroup_min {
        return;
    }

    // Left-to-right, exactly once: collect qualifying runs first, then
    // splice them back-to-front so indices stay valid.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < list.len() {
        let Some(key) = sibling_key(tree, list[i]) else {
            i += 1;
            continue;
        };
        let mut j = i + 1;
        while j < list.len() && sibling_key(tree, list[j]).as_ref() == Some(&key) {
            j += 1;
        }
        if j - i >= policy.sibling_autogroup_min {
            runs.push((i, j));
        }
        i = j;
    }

    for &(start, end) in runs.iter().rev() {
        let members = &list[start..end];
        let mut ag = Node::new(
            NodeValue::SiblingAutogroup { group_count: members.len() },
            Some(owner),
        );
        ag.space = chain_space(tree, members);
        for &member in members {
            for error in tree.node(member).errors.clone() {
                ag.push_error(error);
            }
            for issue in tree.node(member).performance_issues.clone() {
                ag.push_performance_issue(issue);
            }
        }
        ag.children = members.to_vec();
        let ag = tree.push_node(ag);
        for &member in members {
            tree.node_mut(member).parent = Some(ag);
        }
        let owned = if span_view {
            &mut tree.node_mut(owner).span_children
        } else {
            &mut tree.node_mut(owner).children
        };
        owned.splice(start..end, [ag]);
        tree.invalidate_subtree(ag);
    }
}

// ---------------------------------------------------------------------
// Missing instrumentation
// ---------------------------------------------------------------------

/// Insert gap markers between spans across the whole tree, then rebuild the
/// visible list.
pub fn detect_missing_instrumentation(tree: &mut TraceTree, policy: &Policy) {
    let mut insertions: Vec<(NodeId, bool, usize, NodeId, NodeId, f64)> = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(n) = stack.pop() {
        for span_view in [false, true] {
            let list: Vec<NodeId> = if span_view {
                tree.node(n).span_children.clone()
            } else {
                tree.node(n).children.clone()
            };

            // Parent-to-first-child pair: an async span can end before its
            // first child starts.
            if let Some(&first) = list.first() {
                if tree.node(n).span_id().is_some() && !span_view {
                    if let Some(gap) = qualifying_gap(tree, n, first, policy) {
                        insertions.push((n, span_view, 0, n, first, gap));
                    }
                }
            }
            for window in 0..list.len().saturating_sub(1) {
                let (a, b) = (list[window], list[window + 1]);
                if let Some(gap) = qualifying_gap(tree, a, b, policy) {
                    insertions.push((n, span_view, window + 1, a, b, gap));
                }
            }
            stack.extend(list);
        }
        if let NodeValue::ParentAutogroup { head, .. } = tree.node(n).value {
            stack.push(head);
        }
    }

    for (owner, span_view, index, previous, next, gap) in insertions.into_iter().rev() {
        let mut marker = Node::new(
            NodeValue::MissingInstrumentation { previous, next, gap_ms: gap },
            Some(owner),
        );
        marker.space = TraceSpace::new(tree.node(previous).space.end(), gap);
        let marker = tree.push_node(marker);
        if span_view {
            tree.node_mut(owner).span_children.insert(index, marker);
        } else {
            tree.node_mut(owner).children.insert(index, marker);
        }
        tree.invalidate_subtree(owner);
    }
    tree.rebuild_list();
}

/// A qualifying gap between two attached spans, in milliseconds.
///
/// Both neighbors must be spans (markers never stack), the producing SDK
/// must not be on the browser exclusion list, and the gap must exceed the
/// policy threshold.
fn qualifying_gap(tree: &TraceTree, a: NodeId, b: NodeId, policy: &Policy) -> Option<f64> {
    let prev = tree.node(a);
    let next = tree.node(b);
    if prev.span_id().is_none() || next.span_id().is_none() {
        return None;
    }
    if policy.sdk_excluded_from_gaps(prev.sdk_name.as_deref())
        || policy.sdk_excluded_from_gaps(next.sdk_name.as_deref())
    {
        return None;
    }
    let gap = next.space.start - prev.space.end();
    if gap > policy.missing_instrumentation_gap_ms {
        Some(gap)
    } else {
        None
    }
}

/// Remove every gap marker, restoring exact prior adjacency, then rebuild
/// the visible list.
pub fn remove_missing_instrumentation(tree: &mut TraceTree) {
    let mut detached: Vec<NodeId> = Vec::new();
    for index in 0..tree.arena_len() {
        let id = NodeId(index as u32);
        if matches!(tree.node(id).value, NodeValue::MissingInstrumentation { .. }) {
            detached.push(id);
        }
    }
    for id in detached {
        if let Some(parent) = tree.node(id).parent {
            tree.node_mut(parent).children.retain(|&c| c != id);
            tree.node_mut(parent).span_children.retain(|&c| c != id);
            tree.invalidate_subtree(parent);
        }
        tree.node_mut(id).parent = None;
    }
    tree.rebuild_list();
}

// ---------------------------------------------------------------------
// Issues-view collapse
// ---------------------------------------------------------------------

/// Hide runs of children whose subtrees carry no error or performance
/// issue behind opaque placeholders, preserving the path to every issue.
/// Rebuilds the visible list.
pub fn collapse_non_issue_subtrees(tree: &mut TraceTree) {
    let flags = subtree_issue_flags(tree);

    let mut stack = vec![tree.root()];
    while let Some(n) = stack.pop() {
        if matches!(tree.node(n).value, NodeValue::Collapsed { .. }) {
            continue;
        }
        for span_view in [false, true] {
            collapse_runs_in_list(tree, n, span_view, &flags);
        }
        let node = tree.node(n);
        stack.extend(node.children.iter().copied());
        stack.extend(node.span_children.iter().copied());
        if let NodeValue::ParentAutogroup { head, .. } = node.value {
            stack.push(head);
        }
    }
    tree.rebuild_list();
}

fn collapse_runs_in_list(
    tree: &mut TraceTree,
    owner: NodeId,
    span_view: bool,
    flags: &FxHashMap<NodeId, bool>,
) {
    let list: Vec<NodeId> = if span_view {
        tree.node(owner).span_children.clone()
    } else {
        tree.node(owner).children.clone()
    };
    let boring = |id: NodeId| {
        !flags.get(&id).copied().unwrap_or(false)
            && !matches!(tree.node(id).value, NodeValue::Collapsed { .. })
    };

    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < list.len() {
        if !boring(list[i]) {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < list.len() && boring(list[j]) {
            j += 1;
        }
        runs.push((i, j));
        i = j;
    }

    for &(start, end) in runs.iter().rev() {
        let members = &list[start..end];
        let mut placeholder =
            Node::new(NodeValue::Collapsed { hidden: members.len() }, Some(owner));
        placeholder.space = chain_space(tree, members);
        placeholder.children = members.to_vec();
        let placeholder = tree.push_node(placeholder);
        for &member in members {
            tree.node_mut(member).parent = Some(placeholder);
        }
        let owned = if span_view {
            &mut tree.node_mut(owner).span_children
        } else {
            &mut tree.node_mut(owner).children
        };
        owned.splice(start..end, [placeholder]);
        tree.invalidate_subtree(owner);
    }
}

/// Whether each node's subtree (itself included) carries any issue.
fn subtree_issue_flags(tree: &TraceTree) -> FxHashMap<NodeId, bool> {
    let mut flags: FxHashMap<NodeId, bool> = FxHashMap::default();
    let mut stack: Vec<(NodeId, bool)> = vec![(tree.root(), false)];
    while let Some((n, processed)) = stack.pop() {
        let node = tree.node(n);
        if processed {
            let mut flag = node.has_issues();
            for &c in node.children.iter().chain(node.span_children.iter()) {
                flag |= flags.get(&c).copied().unwrap_or(false);
            }
            if let NodeValue::ParentAutogroup { head, .. } = node.value {
                flag |= flags.get(&head).copied().unwrap_or(false);
            }
            flags.insert(n, flag);
        } else {
            stack.push((n, true));
            for &c in node.children.iter().chain(node.span_children.iter()) {
                stack.push((c, false));
            }
            if let NodeValue::ParentAutogroup { head, .. } = node.value {
                stack.push((head, false));
            }
        }
    }
    flags
}
