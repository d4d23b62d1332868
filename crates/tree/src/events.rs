//! Per-tree event dispatch.
//!
//! A minimal typed pub/sub held on the tree instance itself, so multiple
//! trees (tests, side-by-side views) never cross-talk. The only event today
//! is the timeline change fired when fetched data widens the trace's time
//! envelope beyond what was known at initial render.

use tracelens_core::TraceSpace;

/// Handle returned by [`crate::TraceTree::on_timeline_change`], used to
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type TimelineCallback = Box<dyn Fn(TraceSpace) + Send + Sync>;

/// Subscriber registry owned by a tree.
#[derive(Default)]
pub(crate) struct EventRegistry {
    next_id: u64,
    timeline: Vec<(SubscriptionId, TimelineCallback)>,
}

impl EventRegistry {
    pub(crate) fn on_timeline(&mut self, callback: TimelineCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.timeline.push((id, callback));
        id
    }

    pub(crate) fn off_timeline(&mut self, id: SubscriptionId) -> bool {
        let before = self.timeline.len();
        self.timeline.retain(|(sub, _)| *sub != id);
        self.timeline.len() != before
    }

    pub(crate) fn emit_timeline(&self, space: TraceSpace) {
        for (_, callback) in &self.timeline {
            callback(space);
        }
    }
}
