//! Tree vertices.
//!
//! [`Node`] is the atomic unit of the model: a typed payload, parent/child
//! links into the arena, UI state (expanded/zoomed), the time space, and the
//! aggregated issue collections. Derived render state (`depth`, `connectors`)
//! is memoized on the node and invalidated whenever ancestry, sibling order
//! or expand/zoom state changes.

use std::cell::{Cell, RefCell};

use smallvec::SmallVec;
use tracelens_core::{
    EventId, PerformanceIssuePayload, Policy, ProjectSlug, RawSpan, Severity, SpanId,
    TraceErrorPayload, TraceSpace, TransactionPayload,
};

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Arena index as a usize.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The typed payload of a node.
#[derive(Debug, Clone)]
pub enum NodeValue {
    /// The virtual root. Exactly one per tree, depth -1, never rendered.
    Root,
    /// The synthetic trace root row, first visible row of every tree.
    Trace,
    /// A transaction event.
    Transaction(Box<TransactionPayload>),
    /// A span fetched from a transaction's event payload.
    Span(Box<RawSpan>),
    /// An error event rendered as its own row (orphan errors).
    TraceError(Box<TraceErrorPayload>),
    /// A collapsed linear chain of same-operation spans.
    ParentAutogroup {
        /// First span of the chain. Traversal entry point when expanded.
        head: NodeId,
        /// Last span of the chain. Its children are the visible children
        /// when collapsed.
        tail: NodeId,
        /// Number of spans collapsed into this group.
        group_count: usize,
    },
    /// A run of ≥N same-op/description childless sibling spans, held as
    /// direct children.
    SiblingAutogroup {
        /// Number of grouped siblings.
        group_count: usize,
    },
    /// Synthetic marker for a suspicious gap between two spans.
    MissingInstrumentation {
        /// Span that ends before the gap. Non-owning.
        previous: NodeId,
        /// Span that starts after the gap. Non-owning.
        next: NodeId,
        /// Gap width in milliseconds.
        gap_ms: f64,
    },
    /// Opaque placeholder hiding a run of uninteresting rows in the
    /// issues-focused view.
    Collapsed {
        /// Number of rows hidden behind the placeholder.
        hidden: usize,
    },
}

impl NodeValue {
    /// Short kind tag, used by snapshots and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeValue::Root => "root",
            NodeValue::Trace => "trace",
            NodeValue::Transaction(_) => "txn",
            NodeValue::Span(_) => "span",
            NodeValue::TraceError(_) => "error",
            NodeValue::ParentAutogroup { .. } => "ag",
            NodeValue::SiblingAutogroup { .. } => "ag-sibling",
            NodeValue::MissingInstrumentation { .. } => "ms",
            NodeValue::Collapsed { .. } => "collapsed",
        }
    }
}

/// Span fetch lifecycle of a transaction node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Never fetched.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// Spans fetched and merged.
    Resolved,
    /// Last fetch failed; retry is a manual user action.
    Error,
}

/// Fetch cache key material carried by transaction nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    /// Project the event belongs to.
    pub project_slug: Option<ProjectSlug>,
    /// Event id of the node's payload.
    pub event_id: Option<EventId>,
}

/// Marker recording why a node was structurally reparented.
///
/// Guards one-shot heuristics: a reparent fires only while its marker is
/// present and never again once consumed or explicitly cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReparentReason {
    /// An `http.server` transaction demoted under its `pageload` child; on
    /// span fetch it moves under the browser request span.
    PageloadServerHandler,
}

type Connectors = SmallVec<[i32; 4]>;

/// One tree vertex.
#[derive(Debug)]
pub struct Node {
    /// Typed payload.
    pub value: NodeValue,
    /// Parent link. Non-owning; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Owned, ordered children. For transactions this is the nested
    /// transaction list; for spans, the placed span-tree children.
    pub children: Vec<NodeId>,
    /// Fetched span children of a transaction. Mutually exclusive view with
    /// `children`, swapped atomically by zoom.
    pub span_children: Vec<NodeId>,
    /// Whether the node's children are shown.
    pub expanded: bool,
    /// Whether a transaction shows its fetched span children.
    pub zoomed_in: bool,
    /// Span fetch lifecycle.
    pub fetch_status: FetchStatus,
    /// Whether a span fetch could return anything. Cleared when the trace
    /// meta hint reports zero span children.
    pub can_fetch: bool,
    /// `[start, duration]` milliseconds.
    pub space: TraceSpace,
    /// Errors on this node, deduplicated by event id.
    pub errors: Vec<TraceErrorPayload>,
    /// Performance issues on this node, deduplicated by event id.
    pub performance_issues: Vec<PerformanceIssuePayload>,
    /// Profile ids attached to this node.
    pub profiles: Vec<String>,
    /// Fetch cache key material.
    pub metadata: NodeMetadata,
    /// SDK that produced this node's event, used by gap detection.
    pub sdk_name: Option<String>,
    /// The parent-chain autogroup this span is a member of, if any.
    pub autogroup: Option<NodeId>,
    /// One-shot reparent guard.
    pub reparent_reason: Option<ReparentReason>,
    /// Original node when this one is a structural copy made during span
    /// merging. Staleness lookups fall back to this.
    pub cloned_from: Option<NodeId>,

    depth: Cell<Option<i32>>,
    connectors: RefCell<Option<Connectors>>,
}

impl Node {
    /// Create a node with the construction-contract defaults for `value`.
    pub fn new(value: NodeValue, parent: Option<NodeId>) -> Self {
        let expanded = matches!(
            value,
            NodeValue::Root | NodeValue::Trace | NodeValue::Transaction(_) | NodeValue::Span(_)
        );
        Self {
            value,
            parent,
            children: Vec::new(),
            span_children: Vec::new(),
            expanded,
            zoomed_in: false,
            fetch_status: FetchStatus::Idle,
            can_fetch: false,
            space: TraceSpace::ZERO,
            errors: Vec::new(),
            performance_issues: Vec::new(),
            profiles: Vec::new(),
            metadata: NodeMetadata::default(),
            sdk_name: None,
            autogroup: None,
            reparent_reason: None,
            cloned_from: None,
            depth: Cell::new(None),
            connectors: RefCell::new(None),
        }
    }

    /// Build a transaction node, seeding its sets from the embedded payload
    /// arrays.
    pub fn from_transaction(payload: &TransactionPayload, parent: Option<NodeId>) -> Self {
        let mut node = Self::new(NodeValue::Transaction(Box::new(payload.clone())), parent);
        node.space = TraceSpace::from_seconds(payload.start_timestamp, payload.timestamp);
        node.metadata = NodeMetadata {
            project_slug: Some(payload.project_slug.clone()),
            event_id: Some(payload.event_id.clone()),
        };
        node.sdk_name = payload.sdk_name.clone();
        node.can_fetch = true;
        for error in &payload.errors {
            node.push_error(error.clone());
        }
        for issue in &payload.performance_issues {
            node.push_performance_issue(issue.clone());
        }
        if let Some(profile) = &payload.profile_id {
            node.profiles.push(profile.clone());
        }
        node
    }

    /// Build a span node.
    ///
    /// `has_child_transactions` feeds the default-collapse heuristic:
    /// auto-instrumented connection spans with no embedded transactions
    /// start collapsed.
    pub fn from_span(
        raw: &RawSpan,
        parent: Option<NodeId>,
        sdk_name: Option<&str>,
        has_child_transactions: bool,
        policy: &Policy,
    ) -> Self {
        let mut node = Self::new(NodeValue::Span(Box::new(raw.clone())), parent);
        node.space = TraceSpace::from_seconds(raw.start_timestamp, raw.timestamp);
        node.sdk_name = sdk_name.map(str::to_string);
        if policy.op_collapsed_by_default(raw.op.as_deref()) && !has_child_transactions {
            node.expanded = false;
        }
        node
    }

    /// Build an error-row node. It seeds its own singleton error set from
    /// itself.
    pub fn from_trace_error(payload: &TraceErrorPayload, parent: Option<NodeId>) -> Self {
        let mut node = Self::new(NodeValue::TraceError(Box::new(payload.clone())), parent);
        node.space = TraceSpace::from_seconds(payload.timestamp, payload.timestamp);
        node.metadata = NodeMetadata {
            project_slug: Some(payload.project_slug.clone()),
            event_id: Some(payload.event_id.clone()),
        };
        node.errors.push(payload.clone());
        node
    }

    /// Add an error, deduplicated by event id.
    pub fn push_error(&mut self, error: TraceErrorPayload) {
        if !self.errors.iter().any(|e| e.event_id == error.event_id) {
            self.errors.push(error);
        }
    }

    /// Add a performance issue, deduplicated by event id.
    pub fn push_performance_issue(&mut self, issue: PerformanceIssuePayload) {
        if !self
            .performance_issues
            .iter()
            .any(|i| i.event_id == issue.event_id)
        {
            self.performance_issues.push(issue);
        }
    }

    /// Highest severity across this node's errors.
    pub fn max_severity(&self) -> Option<Severity> {
        self.errors.iter().map(|e| e.level).max()
    }

    /// Whether this node carries any error or performance issue.
    pub fn has_issues(&self) -> bool {
        !self.errors.is_empty() || !self.performance_issues.is_empty()
    }

    /// Event id of the payload, when the node kind has one.
    pub fn event_id(&self) -> Option<&EventId> {
        match &self.value {
            NodeValue::Transaction(t) => Some(&t.event_id),
            NodeValue::TraceError(e) => Some(&e.event_id),
            _ => None,
        }
    }

    /// Span id of the payload, when the node is a span.
    pub fn span_id(&self) -> Option<&SpanId> {
        match &self.value {
            NodeValue::Span(s) => Some(&s.span_id),
            _ => None,
        }
    }

    /// Operation string of the payload, when present.
    pub fn op(&self) -> Option<&str> {
        match &self.value {
            NodeValue::Transaction(t) => Some(t.op.as_str()),
            NodeValue::Span(s) => s.op.as_deref(),
            _ => None,
        }
    }

    /// Memoized depth, if computed since the last invalidation.
    pub(crate) fn cached_depth(&self) -> Option<i32> {
        self.depth.get()
    }

    pub(crate) fn set_cached_depth(&self, depth: i32) {
        self.depth.set(Some(depth));
    }

    /// Memoized connectors, if computed since the last invalidation.
    pub(crate) fn cached_connectors(&self) -> Option<Connectors> {
        self.connectors.borrow().clone()
    }

    pub(crate) fn set_cached_connectors(&self, connectors: Connectors) {
        *self.connectors.borrow_mut() = Some(connectors);
    }

    /// Clear memoized depth/connectors. Must be called after any operation
    /// that changes ancestry, sibling order, or expand/zoom state.
    pub fn invalidate(&self) {
        self.depth.set(None);
        *self.connectors.borrow_mut() = None;
    }
}
