//! The API collaborator seam.
//!
//! The tree never talks to a transport directly; it goes through [`TraceApi`]
//! so tests can substitute a scripted implementation and count calls. Each
//! method is at most one attempt: no internal retry, timeouts are the
//! implementor's business.

use async_trait::async_trait;

use tracelens_core::{EventId, EventPayload, OrgSlug, ProjectSlug, TraceMeta, TracePayload};

use crate::error::Result;

/// Query-string parameters shared by trace-level fetches.
#[derive(Debug, Clone)]
pub struct TraceQueryParams {
    /// Organization the trace belongs to.
    pub organization: OrgSlug,
    /// Server-side cap on returned transactions, when set.
    pub limit: Option<u64>,
    /// Point-in-time hint (seconds) narrowing the retention window scanned.
    pub timestamp: Option<f64>,
}

impl TraceQueryParams {
    /// Parameters with only the organization set.
    pub fn new(organization: impl Into<OrgSlug>) -> Self {
        Self { organization: organization.into(), limit: None, timestamp: None }
    }
}

/// A trace-level response: the payload plus its sidecar metadata.
#[derive(Debug, Clone)]
pub struct TraceResponse {
    /// Transactions and orphan errors.
    pub trace: TracePayload,
    /// Event counts and span-count hints.
    pub meta: TraceMeta,
}

/// Read-only trace backend.
#[async_trait]
pub trait TraceApi: Send + Sync {
    /// Fetch a whole trace by id.
    async fn fetch_trace_by_id(
        &self,
        trace_id: &str,
        params: &TraceQueryParams,
    ) -> Result<TraceResponse>;

    /// Fetch the full event body of one transaction, including its `spans`
    /// entry.
    async fn fetch_transaction_spans(
        &self,
        organization: &OrgSlug,
        project_slug: &ProjectSlug,
        event_id: &EventId,
    ) -> Result<EventPayload>;
}
