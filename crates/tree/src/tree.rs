//! The trace tree: arena, construction, flattened projection, mutation.
//!
//! ## Flattened list discipline
//!
//! `list` is the single most contended structure in the model. Every
//! mutation (`expand`, `set_zoom`, `append_tree`) patches it in place with a
//! splice covering the *entire* visible range of the affected subtree.
//! Callers must never assume index stability across a suspension point;
//! indices are re-resolved by node identity via [`TraceTree::index_in_list`].

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracelens_core::{
    CollectedVital, CoreError, EventId, EventPayload, Indicator, Policy, RawSpan, ReplayRecord,
    SpanId, TraceMeta, TracePayload, TraceSpace, TransactionPayload, VitalKind,
};

use crate::events::{EventRegistry, SubscriptionId};
use crate::node::{FetchStatus, Node, NodeId, NodeValue, ReparentReason};
use crate::spans;

/// Lifecycle state of a tree instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStatus {
    /// Placeholder: nothing to show.
    Empty,
    /// Placeholder: trace payload still loading.
    Loading,
    /// Placeholder: trace payload failed to load.
    Error,
    /// A real trace.
    Trace,
}

/// The tree model.
///
/// Owns the node arena, the flattened visible-row projection, and the
/// cross-cutting aggregates (timeline bounds, vital indicators, project ids).
pub struct TraceTree {
    nodes: Vec<Node>,
    root: NodeId,
    trace_node: NodeId,
    list: Vec<NodeId>,
    status: TreeStatus,
    /// Web-vital markers, sorted by start.
    pub indicators: Vec<Indicator>,
    /// Collected measurements per node.
    pub vitals: FxHashMap<NodeId, Vec<CollectedVital>>,
    /// Numeric ids of every project contributing events.
    pub project_ids: BTreeSet<u64>,
    /// Total transactions + errors ingested.
    pub events_count: u64,
    events: EventRegistry,
}

impl TraceTree {
    fn with_status(status: TreeStatus) -> Self {
        let mut nodes = Vec::new();
        nodes.push(Node::new(NodeValue::Root, None));
        let root = NodeId(0);
        let mut trace = Node::new(NodeValue::Trace, Some(root));
        trace.can_fetch = false;
        nodes.push(trace);
        let trace_node = NodeId(1);
        nodes[0].children.push(trace_node);

        Self {
            nodes,
            root,
            trace_node,
            list: Vec::new(),
            status,
            indicators: Vec::new(),
            vitals: FxHashMap::default(),
            project_ids: BTreeSet::new(),
            events_count: 0,
            events: EventRegistry::default(),
        }
    }

    /// Placeholder tree with nothing to show.
    pub fn empty() -> Self {
        let mut tree = Self::with_status(TreeStatus::Empty);
        tree.rebuild_list();
        tree
    }

    /// Placeholder tree while the payload loads.
    pub fn loading() -> Self {
        let mut tree = Self::with_status(TreeStatus::Loading);
        tree.rebuild_list();
        tree
    }

    /// Placeholder tree after a failed load.
    pub fn error() -> Self {
        let mut tree = Self::with_status(TreeStatus::Error);
        tree.rebuild_list();
        tree
    }

    /// Cold construction from a raw trace payload.
    ///
    /// Merge-walks the pre-sorted transaction and orphan-error lists
    /// (tie-break: transaction first), visits nested transactions, collects
    /// trace-wide aggregates and vitals, applies the pageload/http.server
    /// swap, then builds the flattened list.
    pub fn from_trace(
        payload: &TracePayload,
        meta: &TraceMeta,
        replay: Option<&ReplayRecord>,
        policy: &Policy,
    ) -> Self {
        let mut tree = Self::with_status(TreeStatus::Trace);
        let trace_node = tree.trace_node;

        let mut min_s = f64::INFINITY;
        let mut max_s = f64::NEG_INFINITY;

        let txns = &payload.transactions;
        let errs = &payload.orphan_errors;
        let (mut ti, mut ei) = (0usize, 0usize);
        while ti < txns.len() || ei < errs.len() {
            let take_txn = if ti >= txns.len() {
                false
            } else if ei >= errs.len() {
                true
            } else {
                let ts = txns[ti].start_timestamp.unwrap_or(f64::INFINITY);
                let es = errs[ei].timestamp.unwrap_or(f64::INFINITY);
                ts <= es
            };
            if take_txn {
                tree.visit_transaction(&txns[ti], trace_node, meta, &mut min_s, &mut max_s);
                ti += 1;
            } else {
                let error = &errs[ei];
                let node = Node::from_trace_error(error, Some(trace_node));
                let id = tree.push_node(node);
                tree.nodes[trace_node.index()].children.push(id);
                tree.nodes[trace_node.index()].push_error(error.clone());
                if let Some(ts) = error.timestamp {
                    min_s = min_s.min(ts);
                    max_s = max_s.max(ts);
                }
                tree.events_count += 1;
                ei += 1;
            }
        }

        tree.reparent_pageload_server();

        if let Some(replay) = replay {
            min_s = min_s.min(replay.started_at);
            max_s = max_s.max(replay.finished_at);
        }

        tree.indicators
            .sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

        if min_s.is_finite() && max_s.is_finite() {
            let space = TraceSpace::from_seconds(Some(min_s), Some(max_s));
            tree.nodes[tree.trace_node.index()].space = space;
            tree.nodes[tree.root.index()].space = space;
        }

        tree.rebuild_list();
        tree
    }

    /// Visit one top-level transaction and its nested children.
    ///
    /// Iterative with an explicit stack; deeply nested traces must not
    /// recurse.
    fn visit_transaction(
        &mut self,
        payload: &TransactionPayload,
        parent: NodeId,
        meta: &TraceMeta,
        min_s: &mut f64,
        max_s: &mut f64,
    ) {
        let trace_node = self.trace_node;
        let mut stack: Vec<(&TransactionPayload, NodeId)> = vec![(payload, parent)];
        while let Some((p, parent)) = stack.pop() {
            let mut node = Node::from_transaction(p, Some(parent));
            if let Some(&count) = meta.transaction_child_count_map.get(p.event_id.as_str()) {
                node.can_fetch = count > 0;
            }
            let id = self.push_node(node);
            self.nodes[parent.index()].children.push(id);

            for error in &p.errors {
                self.nodes[trace_node.index()].push_error(error.clone());
            }
            for issue in &p.performance_issues {
                self.nodes[trace_node.index()].push_performance_issue(issue.clone());
            }

            if let Some(s) = p.start_timestamp {
                *min_s = min_s.min(s);
                *max_s = max_s.max(s);
            }
            if let Some(e) = p.timestamp {
                *min_s = min_s.min(e);
                *max_s = max_s.max(e);
            }

            self.collect_vitals(id, p);
            self.project_ids.insert(p.project_id);
            self.events_count += 1;

            for child in p.children.iter().rev() {
                stack.push((child, id));
            }
        }
    }

    /// Record a transaction's measurements and emit timeline indicators for
    /// the first occurrence of each renderable vital kind.
    fn collect_vitals(&mut self, id: NodeId, payload: &TransactionPayload) {
        if payload.measurements.is_empty() {
            return;
        }
        let collected: Vec<CollectedVital> = payload
            .measurements
            .iter()
            .map(|(name, m)| CollectedVital { name: name.clone(), value: m.value })
            .collect();
        if let Some(start) = payload.start_timestamp {
            for (name, m) in &payload.measurements {
                if let Some(kind) = VitalKind::from_measurement_name(name) {
                    if !self.indicators.iter().any(|i| i.kind == kind) {
                        self.indicators.push(Indicator {
                            start: start * 1000.0 + m.value,
                            kind,
                            value: m.value,
                        });
                    }
                }
            }
        }
        self.vitals.insert(id, collected);
    }

    /// A `pageload` transaction that is the sole child of an `http.server`
    /// transaction conceptually wraps the server handler; swap them.
    fn reparent_pageload_server(&mut self) {
        let mut swaps: Vec<(NodeId, NodeId)> = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.op() != Some("http.server") || node.children.len() != 1 {
                continue;
            }
            let child = node.children[0];
            if self.nodes[child.index()].op() == Some("pageload") {
                swaps.push((NodeId(index as u32), child));
            }
        }
        for (server, pageload) in swaps {
            let Some(grandparent) = self.nodes[server.index()].parent else {
                continue;
            };
            let gp_children = &mut self.nodes[grandparent.index()].children;
            if let Some(pos) = gp_children.iter().position(|&c| c == server) {
                gp_children[pos] = pageload;
            }
            self.nodes[pageload.index()].parent = Some(grandparent);
            self.nodes[server.index()].children.clear();
            self.nodes[pageload.index()].children.insert(0, server);
            self.nodes[server.index()].parent = Some(pageload);
            self.nodes[server.index()].reparent_reason = Some(ReparentReason::PageloadServerHandler);
            self.invalidate_subtree(pageload);
        }
    }

    // ------------------------------------------------------------------
    // Arena access
    // ------------------------------------------------------------------

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// The virtual root (depth -1, never rendered).
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The synthetic trace-root row.
    pub fn trace_root(&self) -> NodeId {
        self.trace_node
    }

    /// Lifecycle state.
    pub fn status(&self) -> TreeStatus {
        self.status
    }

    /// Overall trace time bounds in milliseconds.
    pub fn space(&self) -> TraceSpace {
        self.nodes[self.trace_node.index()].space
    }

    // ------------------------------------------------------------------
    // Children resolution and traversal
    // ------------------------------------------------------------------

    /// Resolve the visible-children view of a node.
    ///
    /// Single function keyed on node kind and zoom state; traversal code
    /// stays kind-agnostic.
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        let node = &self.nodes[id.index()];
        match &node.value {
            NodeValue::ParentAutogroup { head, tail, .. } => {
                if node.expanded {
                    vec![*head]
                } else {
                    self.nodes[tail.index()].children.clone()
                }
            }
            NodeValue::Transaction(_) => {
                if node.zoomed_in {
                    node.span_children.clone()
                } else {
                    node.children.clone()
                }
            }
            NodeValue::MissingInstrumentation { .. }
            | NodeValue::TraceError(_)
            | NodeValue::Collapsed { .. } => Vec::new(),
            _ => node.children.clone(),
        }
    }

    /// Whether traversal descends through this node.
    ///
    /// Autogroups always descend (their `children_of` already encodes the
    /// collapsed/expanded substitution); missing-instrumentation markers are
    /// always traversed through; everything else follows `expanded`.
    fn descends(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.index()];
        match node.value {
            NodeValue::ParentAutogroup { .. } | NodeValue::MissingInstrumentation { .. } => true,
            _ => node.expanded,
        }
    }

    /// Depth-first, order-preserving list of visible descendants.
    ///
    /// Iterative with an explicit stack; traces with tens of thousands of
    /// nodes must not recurse.
    pub fn visible_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.descends(id) {
            return out;
        }
        let mut stack = self.children_of(id);
        stack.reverse();
        while let Some(n) = stack.pop() {
            out.push(n);
            if self.descends(n) {
                let mut kids = self.children_of(n);
                kids.reverse();
                stack.extend(kids);
            }
        }
        out
    }

    /// Count of visible descendants. Always equals
    /// `visible_children(id).len()`.
    pub fn visible_children_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        if !self.descends(id) {
            return count;
        }
        let mut stack = self.children_of(id);
        while let Some(n) = stack.pop() {
            count += 1;
            if self.descends(n) {
                stack.extend(self.children_of(n));
            }
        }
        count
    }

    // ------------------------------------------------------------------
    // Flattened list
    // ------------------------------------------------------------------

    /// Read-only view of the currently visible rows.
    pub fn list(&self) -> &[NodeId] {
        &self.list
    }

    /// Rebuild the visible list from scratch. Returns `self` for chaining.
    pub fn rebuild_list(&mut self) -> &mut Self {
        self.list = self.visible_children(self.root);
        self
    }

    /// Position of a node in the visible list, resolved by identity with a
    /// clone-reference fallback (the node may have been structurally copied
    /// while a fetch was in flight).
    pub fn index_in_list(&self, id: NodeId) -> Option<usize> {
        if let Some(index) = self.list.iter().position(|&n| n == id) {
            return Some(index);
        }
        self.list
            .iter()
            .position(|&n| self.nodes[n.index()].cloned_from == Some(id))
    }

    /// Expand or collapse a node, patching the visible list in place.
    ///
    /// Returns whether anything changed.
    pub fn expand(&mut self, id: NodeId, expanded: bool) -> bool {
        if self.nodes[id.index()].expanded == expanded {
            return false;
        }
        match self.index_in_list(id) {
            Some(index) => {
                let old = self.visible_children_count(id);
                self.nodes[id.index()].expanded = expanded;
                let fresh = self.visible_children(id);
                self.list.splice(index + 1..index + 1 + old, fresh);
            }
            None => {
                // Hidden under a collapsed ancestor; state still changes.
                self.nodes[id.index()].expanded = expanded;
            }
        }
        self.invalidate_subtree(id);
        true
    }

    /// Swap a transaction between its nested-transaction view and its
    /// fetched-span view. The swap is atomic: the list splice replaces the
    /// node's entire visible range in one operation.
    ///
    /// Zoom-out keeps the fetched span subtree so re-zooming is instant.
    pub fn set_zoom(&mut self, id: NodeId, zoomed_in: bool) -> bool {
        if self.nodes[id.index()].zoomed_in == zoomed_in {
            return false;
        }
        match self.index_in_list(id) {
            Some(index) => {
                let old = self.visible_children_count(id);
                self.nodes[id.index()].zoomed_in = zoomed_in;
                let fresh = self.visible_children(id);
                self.list.splice(index + 1..index + 1 + old, fresh);
            }
            None => {
                self.nodes[id.index()].zoomed_in = zoomed_in;
            }
        }
        self.invalidate_subtree(id);
        true
    }

    /// Merge a fetched span payload into the tree at `id` and zoom in.
    ///
    /// Sorts spans by start timestamp (API responses are not guaranteed
    /// sorted), delegates to the span merge, widens the trace bounds when
    /// the fetched spans exceed them, and fires the timeline-change event if
    /// bounds actually moved.
    pub fn apply_span_event(
        &mut self,
        id: NodeId,
        event: &EventPayload,
        policy: &Policy,
    ) -> Result<bool, CoreError> {
        let spans = event.spans().ok_or(CoreError::MissingSpansEntry)?;
        let mut sorted: Vec<RawSpan> = spans.to_vec();
        sorted.sort_by(|a, b| {
            let sa = a.start_timestamp.unwrap_or(f64::INFINITY);
            let sb = b.start_timestamp.unwrap_or(f64::INFINITY);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let bounds = spans::from_spans(self, id, event, &sorted, policy)?;
        self.nodes[id.index()].fetch_status = FetchStatus::Resolved;
        let changed = self.set_zoom(id, true);

        if let Some((min_s, max_s)) = bounds {
            self.widen_space(TraceSpace::from_seconds(Some(min_s), Some(max_s)));
        }
        Ok(changed)
    }

    /// Widen the trace bounds to also cover `incoming`. Fires the
    /// timeline-change event when bounds actually moved. Never narrows.
    pub fn widen_space(&mut self, incoming: TraceSpace) -> bool {
        let mut space = self.nodes[self.trace_node.index()].space;
        let changed = space.widen_to_include(incoming);
        if changed {
            self.nodes[self.trace_node.index()].space = space;
            self.nodes[self.root.index()].space = space;
            self.events.emit_timeline(space);
        }
        changed
    }

    // ------------------------------------------------------------------
    // Append (multi-trace merge)
    // ------------------------------------------------------------------

    /// Merge another tree's trace into this one.
    ///
    /// Moves the other trace-root's children under this trace root, merges
    /// error/issue/profile sets and vitals, recomputes indicators from the
    /// merged vitals, and extends the visible list with the newly visible
    /// rows. No full rebuild.
    pub fn append_tree(&mut self, other: TraceTree) {
        let offset = self.nodes.len() as u32;
        let remap = |id: NodeId| NodeId(id.0 + offset);

        let TraceTree {
            nodes: other_nodes,
            trace_node: other_trace,
            vitals: other_vitals,
            project_ids: other_projects,
            events_count: other_events,
            ..
        } = other;

        for mut node in other_nodes {
            node.parent = node.parent.map(remap);
            for child in node.children.iter_mut() {
                *child = remap(*child);
            }
            for child in node.span_children.iter_mut() {
                *child = remap(*child);
            }
            node.autogroup = node.autogroup.map(remap);
            node.cloned_from = node.cloned_from.map(remap);
            match &mut node.value {
                NodeValue::ParentAutogroup { head, tail, .. } => {
                    *head = remap(*head);
                    *tail = remap(*tail);
                }
                NodeValue::MissingInstrumentation { previous, next, .. } => {
                    *previous = remap(*previous);
                    *next = remap(*next);
                }
                _ => {}
            }
            node.invalidate();
            self.nodes.push(node);
        }

        let other_trace = remap(other_trace);
        let trace_node = self.trace_node;

        // The previously-last child is no longer last; its connectors are
        // stale.
        if let Some(&last) = self.nodes[trace_node.index()].children.last() {
            self.invalidate_subtree(last);
        }

        let moved = std::mem::take(&mut self.nodes[other_trace.index()].children);
        let merged_errors = std::mem::take(&mut self.nodes[other_trace.index()].errors);
        let merged_issues =
            std::mem::take(&mut self.nodes[other_trace.index()].performance_issues);
        let merged_profiles = std::mem::take(&mut self.nodes[other_trace.index()].profiles);

        for &child in &moved {
            self.nodes[child.index()].parent = Some(trace_node);
            self.nodes[trace_node.index()].children.push(child);
        }
        for error in merged_errors {
            self.nodes[trace_node.index()].push_error(error);
        }
        for issue in merged_issues {
            self.nodes[trace_node.index()].push_performance_issue(issue);
        }
        self.nodes[trace_node.index()].profiles.extend(merged_profiles);

        // Vitals move over with remapped keys; indicators are recomputed
        // for vital-bearing nodes with a known start.
        for (id, collected) in other_vitals {
            let id = remap(id);
            for vital in &collected {
                if let Some(kind) = VitalKind::from_measurement_name(&vital.name) {
                    if !self.indicators.iter().any(|i| i.kind == kind) {
                        let start = self.nodes[id.index()].space.start;
                        self.indicators.push(Indicator {
                            start: start + vital.value,
                            kind,
                            value: vital.value,
                        });
                    }
                }
            }
            self.vitals.insert(id, collected);
        }
        self.indicators
            .sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

        self.project_ids.extend(other_projects);
        self.events_count += other_events;

        // Append the newly visible rows without a full rebuild.
        if self.descends(trace_node) && self.index_in_list(trace_node).is_some() {
            for &child in &moved {
                self.list.push(child);
                self.list.extend(self.visible_children(child));
            }
        }

        let other_space = self.nodes[other_trace.index()].space;
        self.widen_space(other_space);
    }

    // ------------------------------------------------------------------
    // Derived render state
    // ------------------------------------------------------------------

    /// The parent a row is rendered under.
    ///
    /// Differs from the structural parent in one case: children of the tail
    /// of a *collapsed* parent autogroup render under the autogroup row.
    pub fn visual_parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id.index()].parent?;
        if let Some(ag) = self.nodes[parent.index()].autogroup {
            if let NodeValue::ParentAutogroup { tail, .. } = self.nodes[ag.index()].value {
                if tail == parent && !self.nodes[ag.index()].expanded {
                    return Some(ag);
                }
            }
        }
        Some(parent)
    }

    /// Memoized render depth. Root is -1, the trace row 0.
    pub fn depth_of(&self, id: NodeId) -> i32 {
        if let Some(depth) = self.nodes[id.index()].cached_depth() {
            return depth;
        }
        let mut chain = vec![id];
        let base = loop {
            let Some(&cur) = chain.last() else { break -1 };
            if cur == self.root {
                chain.pop();
                break -1;
            }
            match self.visual_parent(cur) {
                Some(parent) => {
                    if let Some(depth) = self.nodes[parent.index()].cached_depth() {
                        break depth;
                    }
                    chain.push(parent);
                }
                None => {
                    chain.pop();
                    break -1;
                }
            }
        };
        let mut depth = base;
        for &n in chain.iter().rev() {
            depth += 1;
            self.nodes[n.index()].set_cached_depth(depth);
        }
        depth
    }

    fn has_next_visible_sibling(&self, id: NodeId) -> bool {
        let Some(parent) = self.visual_parent(id) else {
            return false;
        };
        let siblings = self.children_of(parent);
        match siblings.iter().position(|&s| s == id) {
            Some(pos) => pos + 1 < siblings.len(),
            None => false,
        }
    }

    /// Memoized connector guides: the depths at which ancestor vertical
    /// lines continue through this row.
    pub fn connectors_of(&self, id: NodeId) -> SmallVec<[i32; 4]> {
        if let Some(connectors) = self.nodes[id.index()].cached_connectors() {
            return connectors;
        }
        let mut chain = vec![id];
        let base = loop {
            let Some(&cur) = chain.last() else {
                break SmallVec::new();
            };
            match self.visual_parent(cur) {
                None => {
                    break SmallVec::new();
                }
                Some(parent) => {
                    if parent == self.root {
                        break SmallVec::new();
                    }
                    if let Some(connectors) = self.nodes[parent.index()].cached_connectors() {
                        break connectors;
                    }
                    chain.push(parent);
                }
            }
        };
        let mut acc = base;
        for &n in chain.iter().rev() {
            let mut mine = acc.clone();
            if let Some(parent) = self.visual_parent(n) {
                if parent != self.root && self.has_next_visible_sibling(parent) {
                    mine.push(self.depth_of(parent));
                }
            }
            self.nodes[n.index()].set_cached_connectors(mine.clone());
            acc = mine;
        }
        acc
    }

    /// Whether a row is the last among its visible siblings.
    pub fn is_last_child(&self, id: NodeId) -> bool {
        !self.has_next_visible_sibling(id)
    }

    /// Clear memoized depth/connectors on `id` and everything below it,
    /// including the head chain of a collapsed parent autogroup (which is
    /// not reachable through the visible children view).
    pub fn invalidate_subtree(&self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n.index()];
            node.invalidate();
            stack.extend(node.children.iter().copied());
            stack.extend(node.span_children.iter().copied());
            if let NodeValue::ParentAutogroup { head, .. } = node.value {
                stack.push(head);
            }
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Subscribe to timeline bound changes. Fired with the new
    /// `[start, duration]` whenever fetched data widens the envelope.
    pub fn on_timeline_change(
        &mut self,
        callback: impl Fn(TraceSpace) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.on_timeline(Box::new(callback))
    }

    /// Unsubscribe. Returns whether a subscription was removed.
    pub fn off_timeline_change(&mut self, id: SubscriptionId) -> bool {
        self.events.off_timeline(id)
    }

    // ------------------------------------------------------------------
    // Lookup helpers
    // ------------------------------------------------------------------

    /// Whether a node is still reachable from the root through owning child
    /// lists. Detached nodes (removed markers, dead placeholder roots) stay
    /// in the arena but are not attached.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            let Some(parent) = self.nodes[cur.index()].parent else {
                return cur == self.root;
            };
            let p = &self.nodes[parent.index()];
            if !p.children.contains(&cur) && !p.span_children.contains(&cur) {
                return false;
            }
            cur = parent;
        }
    }

    /// Find the original (non-clone) transaction node for an event id.
    pub fn find_transaction(&self, event_id: &EventId) -> Option<NodeId> {
        self.scan(|node| {
            node.cloned_from.is_none()
                && matches!(&node.value, NodeValue::Transaction(t) if t.event_id == *event_id)
        })
    }

    /// Find an error row by event id.
    pub fn find_error(&self, event_id: &EventId) -> Option<NodeId> {
        self.scan(
            |node| matches!(&node.value, NodeValue::TraceError(e) if e.event_id == *event_id),
        )
    }

    /// Find a span node in the subtree under `root` by span id.
    pub fn find_span_in_subtree(&self, root: NodeId, span_id: &SpanId) -> Option<NodeId> {
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n.index()];
            if node.span_id() == Some(span_id) {
                return Some(n);
            }
            stack.extend(node.children.iter().copied());
            stack.extend(node.span_children.iter().copied());
            if let NodeValue::ParentAutogroup { head, .. } = node.value {
                stack.push(head);
            }
        }
        None
    }

    /// Find an autogroup by its anchor span id (head span for parent
    /// groups, first member for sibling groups).
    pub fn find_autogroup(&self, anchor: &SpanId) -> Option<NodeId> {
        self.scan(|node| match &node.value {
            NodeValue::ParentAutogroup { head, .. } => {
                self.nodes[head.index()].span_id() == Some(anchor)
            }
            NodeValue::SiblingAutogroup { .. } => node
                .children
                .first()
                .and_then(|&c| self.nodes[c.index()].span_id())
                == Some(anchor),
            _ => false,
        })
    }

    /// Find an attached missing-instrumentation marker by the span id of
    /// its preceding neighbor.
    pub fn find_missing_instrumentation(&self, anchor: &SpanId) -> Option<NodeId> {
        self.scan(|node| match &node.value {
            NodeValue::MissingInstrumentation { previous, .. } => {
                self.nodes[previous.index()].span_id() == Some(anchor)
            }
            _ => false,
        })
    }

    fn scan(&self, predicate: impl Fn(&Node) -> bool) -> Option<NodeId> {
        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index as u32);
            if predicate(node) && self.is_attached(id) {
                return Some(id);
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Deterministic structural dump, independent of memoized state and
    /// arena garbage. Two trees with the same structure produce the same
    /// string; tests compare snapshots for exact-restore properties.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(self.root, 0)];
        while let Some((id, indent)) = stack.pop() {
            let node = &self.nodes[id.index()];
            let label = match &node.value {
                NodeValue::Transaction(t) => format!("{} {}", t.op, t.event_id),
                NodeValue::Span(s) => format!(
                    "{} {}",
                    s.op.as_deref().unwrap_or("<no-op>"),
                    s.span_id
                ),
                NodeValue::TraceError(e) => format!("{}", e.event_id),
                NodeValue::ParentAutogroup { group_count, .. } => format!("x{}", group_count),
                NodeValue::SiblingAutogroup { group_count } => format!("x{}", group_count),
                NodeValue::MissingInstrumentation { gap_ms, .. } => format!("{}ms", gap_ms),
                NodeValue::Collapsed { hidden } => format!("{} hidden", hidden),
                _ => String::new(),
            };
            out.push_str(&format!(
                "{:indent$}{} {} [{}, {}] expanded={} zoomed={}\n",
                "",
                node.value.kind(),
                label,
                node.space.start,
                node.space.duration,
                node.expanded,
                node.zoomed_in,
                indent = indent
            ));
            let mut kids: Vec<(NodeId, usize)> = Vec::new();
            for &c in &node.children {
                kids.push((c, indent + 2));
            }
            for &c in &node.span_children {
                kids.push((c, indent + 2));
            }
            if let NodeValue::ParentAutogroup { head, .. } = node.value {
                kids.push((head, indent + 2));
            }
            for k in kids.into_iter().rev() {
                stack.push(k);
            }
        }
        out
    }
}
