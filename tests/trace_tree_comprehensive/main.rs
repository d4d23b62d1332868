//! Trace Tree Comprehensive Test Suite
//!
//! End-to-end coverage of the trace tree model through the facade:
//! construction from raw payloads, structural passes (autogrouping,
//! missing-instrumentation markers), zoom/fetch orchestration with request
//! deduplication, multi-trace backfill, time-sliced search and node-path
//! deep linking.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test trace_tree_comprehensive
//!
//! # Run one area only
//! cargo test --test trace_tree_comprehensive zoom::
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use tracelens::fetch::{FetchError, TraceApi, TraceQueryParams, TraceResponse};
use tracelens::model::{EventId, EventPayload, OrgSlug, Policy, ProjectSlug, TraceMeta, TracePayload};
use tracelens::tree::TraceTree;

pub mod backfill;
pub mod construction;
pub mod missing_instrumentation;
pub mod search;
pub mod zoom;

// =============================================================================
// SHARED PAYLOAD BUILDERS
// =============================================================================

/// A transaction payload value with no children.
pub fn txn_json(
    event_id: &str,
    project: &str,
    op: &str,
    name: &str,
    start: f64,
    end: f64,
) -> serde_json::Value {
    serde_json::json!({
        "event_id": event_id,
        "project_slug": project,
        "transaction.op": op,
        "transaction": name,
        "start_timestamp": start,
        "timestamp": end,
    })
}

/// A raw span value.
pub fn span_json(span_id: &str, op: &str, description: &str, start: f64, end: f64) -> serde_json::Value {
    serde_json::json!({
        "span_id": span_id,
        "op": op,
        "description": description,
        "start_timestamp": start,
        "timestamp": end,
    })
}

/// A raw span value attached under another span.
pub fn child_span_json(
    span_id: &str,
    parent: &str,
    op: &str,
    description: &str,
    start: f64,
    end: f64,
) -> serde_json::Value {
    let mut value = span_json(span_id, op, description, start, end);
    value["parent_span_id"] = serde_json::Value::String(parent.to_string());
    value
}

/// Assemble a trace payload from transaction and orphan-error values.
pub fn trace_payload(
    transactions: Vec<serde_json::Value>,
    orphan_errors: Vec<serde_json::Value>,
) -> TracePayload {
    serde_json::from_value(serde_json::json!({
        "transactions": transactions,
        "orphan_errors": orphan_errors,
    }))
    .expect("fixture payload must deserialize")
}

/// Assemble a span-fetch event payload.
pub fn spans_event(sdk_name: Option<&str>, spans: Vec<serde_json::Value>) -> EventPayload {
    serde_json::from_value(serde_json::json!({
        "entries": [{"type": "spans", "data": spans}],
        "sdk_name": sdk_name,
    }))
    .expect("fixture event must deserialize")
}

/// Build a tree with default meta and policy.
pub fn build(payload: &TracePayload) -> TraceTree {
    TraceTree::from_trace(payload, &TraceMeta::default(), None, &Policy::default())
}

// =============================================================================
// SCRIPTED API COLLABORATOR
// =============================================================================

type SpanScript = HashMap<String, Result<EventPayload, String>>;
type TraceScript = HashMap<String, Result<TraceResponse, String>>;

/// Scripted [`TraceApi`] with per-endpoint call counting.
#[derive(Default)]
pub struct MockApi {
    spans: Mutex<SpanScript>,
    traces: Mutex<TraceScript>,
    span_calls: Mutex<HashMap<String, usize>>,
    trace_calls: Mutex<HashMap<String, usize>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stage_spans(&self, event_id: &str, event: EventPayload) {
        self.spans.lock().insert(event_id.to_string(), Ok(event));
    }

    pub fn fail_spans(&self, event_id: &str, message: &str) {
        self.spans.lock().insert(event_id.to_string(), Err(message.to_string()));
    }

    pub fn stage_trace(&self, trace_id: &str, response: TraceResponse) {
        self.traces.lock().insert(trace_id.to_string(), Ok(response));
    }

    pub fn fail_trace(&self, trace_id: &str, message: &str) {
        self.traces.lock().insert(trace_id.to_string(), Err(message.to_string()));
    }

    pub fn span_calls(&self, event_id: &str) -> usize {
        self.span_calls.lock().get(event_id).copied().unwrap_or(0)
    }

    pub fn trace_calls(&self, trace_id: &str) -> usize {
        self.trace_calls.lock().get(trace_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TraceApi for MockApi {
    async fn fetch_trace_by_id(
        &self,
        trace_id: &str,
        _params: &TraceQueryParams,
    ) -> Result<TraceResponse, FetchError> {
        *self.trace_calls.lock().entry(trace_id.to_string()).or_insert(0) += 1;
        match self.traces.lock().get(trace_id) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(FetchError::Api(message.clone())),
            None => Err(FetchError::Api(format!("unknown trace {trace_id}"))),
        }
    }

    async fn fetch_transaction_spans(
        &self,
        _organization: &OrgSlug,
        _project_slug: &ProjectSlug,
        event_id: &EventId,
    ) -> Result<EventPayload, FetchError> {
        *self
            .span_calls
            .lock()
            .entry(event_id.as_str().to_string())
            .or_insert(0) += 1;
        match self.spans.lock().get(event_id.as_str()) {
            Some(Ok(event)) => Ok(event.clone()),
            Some(Err(message)) => Err(FetchError::Api(message.clone())),
            None => Err(FetchError::Api(format!("unknown event {event_id}"))),
        }
    }
}
