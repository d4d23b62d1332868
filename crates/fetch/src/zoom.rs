//! The zoom-in/zoom-out state machine.
//!
//! Zooming a transaction in swaps its nested-transaction children for its
//! fetched spans, fetching them on first use. The fetch happens outside the
//! tree lock; by the time the response lands the node may have left the
//! visible tree (a backfill merge or a re-fetch replaced it), so resolution
//! re-checks attachment and silently drops stale responses.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use tracelens_core::{OrgSlug, Policy};
use tracelens_tree::{FetchStatus, NodeId, TraceTree};

use crate::api::TraceApi;
use crate::cache::{FetchKey, InflightCache};
use crate::error::{FetchError, Result};

/// Drives zoom transitions against a shared tree.
pub struct ZoomController {
    api: Arc<dyn TraceApi>,
    cache: InflightCache,
    organization: OrgSlug,
    policy: Policy,
}

impl ZoomController {
    /// Controller fetching through `api` on behalf of `organization`.
    pub fn new(api: Arc<dyn TraceApi>, organization: OrgSlug, policy: Policy) -> Self {
        Self { api, cache: InflightCache::new(), organization, policy }
    }

    /// The underlying deduplication cache, for observability.
    pub fn cache(&self) -> &InflightCache {
        &self.cache
    }

    /// Zoom `node` in (`true`, fetching spans on first use) or out
    /// (`false`, synchronous). Returns whether the visible list changed.
    ///
    /// State machine per node: `Idle/Resolved/Error -> Loading -> Resolved |
    /// Error`. A failed fetch marks the node `Error` and leaves the tree
    /// untouched; retry is the caller zooming in again.
    pub async fn zoom_in(
        &self,
        tree: &Mutex<TraceTree>,
        node: NodeId,
        zoomed_in: bool,
    ) -> Result<bool> {
        if !zoomed_in {
            return Ok(tree.lock().set_zoom(node, false));
        }

        let key = {
            let mut guard = tree.lock();
            let target = guard.node(node);
            if target.zoomed_in {
                return Ok(false);
            }
            if !target.can_fetch || target.fetch_status == FetchStatus::Resolved {
                // Spans already merged (or nothing to fetch): instant swap.
                return Ok(guard.set_zoom(node, true));
            }
            let (Some(project_slug), Some(event_id)) =
                (target.metadata.project_slug.clone(), target.metadata.event_id.clone())
            else {
                return Err(FetchError::NotFetchable);
            };
            guard.node_mut(node).fetch_status = FetchStatus::Loading;
            FetchKey {
                organization: self.organization.clone(),
                project_slug,
                event_id,
            }
        };

        let response = self.cache.fetch_spans(Arc::clone(&self.api), key).await;

        let mut guard = tree.lock();
        if !guard.is_attached(node) {
            // The node was replaced while the fetch was in flight. Drop the
            // response; whoever owns the replacement will fetch again.
            debug!(node = node.index(), "discarding span response for detached node");
            return Ok(false);
        }
        match response {
            // A payload that cannot be merged is a failed zoom too: the node
            // must land on `Error` so a retry is offered.
            Ok(event) => match guard.apply_span_event(node, &event, &self.policy) {
                Ok(changed) => Ok(changed),
                Err(err) => {
                    guard.node_mut(node).fetch_status = FetchStatus::Error;
                    Err(err.into())
                }
            },
            Err(err) => {
                guard.node_mut(node).fetch_status = FetchStatus::Error;
                Err(err)
            }
        }
    }
}
