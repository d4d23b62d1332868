//! In-flight request deduplication.
//!
//! Two zooms can target the same transaction through different UI paths (a
//! row click and a deep link, say) before the first response lands. The
//! cache keys in-flight span fetches by organization + project + event and
//! hands every concurrent caller the same shared future, so the backend
//! sees one request. Entries are dropped the moment the request settles;
//! response bodies are not cached here, the tree keeps merged spans itself.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use tracelens_core::{EventId, EventPayload, OrgSlug, ProjectSlug};

use crate::api::TraceApi;
use crate::error::FetchError;

/// Identity of one span fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    /// Organization slug.
    pub organization: OrgSlug,
    /// Project slug.
    pub project_slug: ProjectSlug,
    /// Transaction event id.
    pub event_id: EventId,
}

type SpanFetch = Shared<BoxFuture<'static, Result<Arc<EventPayload>, FetchError>>>;

/// Promise cache deduplicating concurrent span fetches per [`FetchKey`].
#[derive(Clone, Default)]
pub struct InflightCache {
    inner: Arc<Mutex<FxHashMap<FetchKey, SpanFetch>>>,
}

impl InflightCache {
    /// New empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the spans for `key`, joining an in-flight request when one
    /// exists.
    pub fn fetch_spans(&self, api: Arc<dyn TraceApi>, key: FetchKey) -> SpanFetch {
        let mut inflight = self.inner.lock();
        if let Some(existing) = inflight.get(&key) {
            return existing.clone();
        }

        let slot = Arc::clone(&self.inner);
        let request_key = key.clone();
        let fetch = async move {
            let result = api
                .fetch_transaction_spans(
                    &request_key.organization,
                    &request_key.project_slug,
                    &request_key.event_id,
                )
                .await;
            slot.lock().remove(&request_key);
            result.map(Arc::new)
        }
        .boxed()
        .shared();

        inflight.insert(key, fetch.clone());
        fetch
    }

    /// Number of unsettled requests.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }
}
