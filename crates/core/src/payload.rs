//! Raw payload types as delivered by the API collaborator.
//!
//! These mirror the trace endpoint's JSON shape. Unknown fields are kept in
//! an `extra` map on each struct so the search evaluator can resolve
//! arbitrary field names without this crate enumerating every attribute the
//! backend might attach.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EventId, ProjectSlug, SpanId};

/// The full payload for one trace: top-level transactions plus errors that
/// could not be attributed to any transaction.
///
/// Both lists arrive pre-sorted by start time; construction relies on that
/// and merge-walks them without re-sorting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TracePayload {
    /// Root transactions, each with its nested transaction children.
    #[serde(default)]
    pub transactions: Vec<TransactionPayload>,
    /// Errors with no owning transaction.
    #[serde(default)]
    pub orphan_errors: Vec<TraceErrorPayload>,
}

/// One transaction event in the trace, with its nested transaction children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Event id, unique per occurrence.
    pub event_id: EventId,
    /// Project the transaction belongs to.
    pub project_slug: ProjectSlug,
    /// Numeric project id.
    #[serde(default)]
    pub project_id: u64,
    /// Operation, e.g. `http.server` or `pageload`.
    #[serde(rename = "transaction.op", default)]
    pub op: String,
    /// Transaction name.
    #[serde(default)]
    pub transaction: String,
    /// Start timestamp in seconds.
    pub start_timestamp: Option<f64>,
    /// End timestamp in seconds.
    pub timestamp: Option<f64>,
    /// Span id of the parent span, when the transaction is nested under a
    /// span of another transaction.
    #[serde(default)]
    pub parent_span_id: Option<SpanId>,
    /// Nested transaction children, pre-sorted by start time.
    #[serde(default)]
    pub children: Vec<TransactionPayload>,
    /// Errors that occurred inside this transaction.
    #[serde(default)]
    pub errors: Vec<TraceErrorPayload>,
    /// Performance issues detected on this transaction.
    #[serde(default)]
    pub performance_issues: Vec<PerformanceIssuePayload>,
    /// Web-vital and custom measurements keyed by measurement name.
    #[serde(default)]
    pub measurements: BTreeMap<String, Measurement>,
    /// Profile attached to this transaction, if any.
    #[serde(default)]
    pub profile_id: Option<String>,
    /// Name of the SDK that produced the event.
    #[serde(default)]
    pub sdk_name: Option<String>,
    /// Everything else the backend attached.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One raw span as found in the event's `spans` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSpan {
    /// Span id.
    pub span_id: SpanId,
    /// Parent span id, absent for the root span of the transaction.
    #[serde(default)]
    pub parent_span_id: Option<SpanId>,
    /// Operation, e.g. `db` or `http.client`.
    #[serde(default)]
    pub op: Option<String>,
    /// Human-readable description (query text, URL, ...).
    #[serde(default)]
    pub description: Option<String>,
    /// Start timestamp in seconds.
    pub start_timestamp: Option<f64>,
    /// End timestamp in seconds.
    pub timestamp: Option<f64>,
    /// Everything else (`data`, `tags`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Severity of an error event, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Diagnostic noise.
    Debug,
    /// Informational.
    Info,
    /// Something looks off.
    Warning,
    /// An error.
    #[default]
    Error,
    /// Process-terminating.
    Fatal,
}

/// One error event, either embedded in a transaction or orphaned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceErrorPayload {
    /// Event id of the error occurrence.
    pub event_id: EventId,
    /// Issue group id, when the backend grouped the occurrence.
    #[serde(default)]
    pub issue_id: Option<u64>,
    /// Project the error belongs to.
    pub project_slug: ProjectSlug,
    /// Span the error occurred in, when known.
    #[serde(default)]
    pub span: Option<SpanId>,
    /// Severity level.
    #[serde(default)]
    pub level: Severity,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Point-in-time timestamp in seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One performance issue (N+1 queries, slow DB span, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceIssuePayload {
    /// Event id of the issue occurrence.
    pub event_id: EventId,
    /// Issue group id.
    #[serde(default)]
    pub issue_id: Option<u64>,
    /// Project the issue belongs to.
    pub project_slug: ProjectSlug,
    /// Primary offending spans.
    #[serde(default)]
    pub span: Vec<SpanId>,
    /// Additional suspect spans.
    #[serde(default)]
    pub suspect_spans: Vec<SpanId>,
    /// Start timestamp in seconds.
    #[serde(default)]
    pub start: Option<f64>,
    /// End timestamp in seconds.
    #[serde(default)]
    pub end: Option<f64>,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Everything else.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A single measurement value attached to a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Measurement {
    /// The measured value. Unit depends on the measurement kind; web vitals
    /// are milliseconds.
    pub value: f64,
}

/// Session replay record overlapping this trace, used to widen the trace
/// time bounds so the replay timeline fits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Replay start in seconds.
    pub started_at: f64,
    /// Replay end in seconds.
    pub finished_at: f64,
}

/// Trace-level metadata counts, fetched alongside the trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceMeta {
    /// Total number of events in the trace, when known.
    #[serde(default)]
    pub events: Option<u64>,
    /// Per-transaction span child counts, keyed by event id.
    ///
    /// A present hint of zero means a span fetch would return nothing and is
    /// skipped entirely.
    #[serde(default)]
    pub transaction_child_count_map: BTreeMap<String, u64>,
}

/// The detailed event payload returned by the span-fetch endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    /// Typed entry sections; exactly one should be [`Entry::Spans`].
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Name of the SDK that produced the event, e.g.
    /// `sentry.javascript.browser`.
    #[serde(default)]
    pub sdk_name: Option<String>,
}

impl EventPayload {
    /// The raw spans of this event, if a spans entry is present.
    pub fn spans(&self) -> Option<&[RawSpan]> {
        self.entries.iter().find_map(|e| match e {
            Entry::Spans { data } => Some(data.as_slice()),
            Entry::Other => None,
        })
    }
}

/// One entry section of an event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    /// The span list.
    Spans {
        /// Raw spans, not guaranteed sorted.
        data: Vec<RawSpan>,
    },
    /// Any entry kind this model does not consume (breadcrumbs, request, ...).
    #[serde(other)]
    Other,
}
