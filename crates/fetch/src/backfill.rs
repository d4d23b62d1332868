//! Incremental multi-trace backfill.
//!
//! A trace view can discover additional sub-traces after the first payload
//! renders (linked traces, session continuations). The orchestrator drains
//! the queue front-first in fixed batches, awaits every fetch in a batch
//! regardless of individual failures, and merges each successful response
//! into the live tree immediately so rows appear as data lands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::warn;

use tracelens_core::Policy;
use tracelens_tree::TraceTree;

use crate::api::{TraceApi, TraceQueryParams};
use crate::error::FetchError;

/// One queued sub-trace.
#[derive(Debug, Clone)]
pub struct SubTraceRef {
    /// Trace id to fetch.
    pub trace_id: String,
    /// Point-in-time hint (seconds) for the retention scan.
    pub timestamp: Option<f64>,
}

/// What a backfill run accomplished.
#[derive(Debug, Default)]
pub struct BackfillOutcome {
    /// Sub-traces fetched and merged.
    pub merged: usize,
    /// Failures, in queue order. Display data that did load regardless.
    pub errors: Vec<FetchError>,
}

/// Drains a sub-trace queue in bounded batches.
pub struct BackfillOrchestrator {
    api: Arc<dyn TraceApi>,
    params: TraceQueryParams,
    policy: Policy,
    fetching: AtomicBool,
}

impl BackfillOrchestrator {
    /// Orchestrator fetching through `api` with `params`.
    pub fn new(api: Arc<dyn TraceApi>, params: TraceQueryParams, policy: Policy) -> Self {
        Self { api, params, policy, fetching: AtomicBool::new(false) }
    }

    /// Whether a run is currently in progress.
    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    /// Fetch every queued sub-trace and merge the results into `tree`.
    ///
    /// Batches of `policy.backfill_batch_size` run concurrently; the queue
    /// is consumed front-first and every batch is attempted even when an
    /// earlier one failed entirely. Each endpoint is called exactly once.
    pub async fn run(&self, tree: &Mutex<TraceTree>, mut queue: Vec<SubTraceRef>) -> BackfillOutcome {
        self.fetching.store(true, Ordering::Release);
        let mut outcome = BackfillOutcome::default();

        while !queue.is_empty() {
            let take = queue.len().min(self.policy.backfill_batch_size);
            let batch: Vec<SubTraceRef> = queue.drain(..take).collect();

            let requests = batch.iter().map(|sub| {
                let mut params = self.params.clone();
                params.timestamp = sub.timestamp;
                async move { self.api.fetch_trace_by_id(&sub.trace_id, &params).await }
            });
            for (sub, result) in batch.iter().zip(join_all(requests).await) {
                match result {
                    Ok(response) => {
                        let fetched = TraceTree::from_trace(
                            &response.trace,
                            &response.meta,
                            None,
                            &self.policy,
                        );
                        tree.lock().append_tree(fetched);
                        outcome.merged += 1;
                    }
                    Err(err) => {
                        warn!(trace_id = %sub.trace_id, error = %err, "sub-trace fetch failed");
                        outcome.errors.push(err);
                    }
                }
            }
        }

        self.fetching.store(false, Ordering::Release);
        outcome
    }
}
