//! Convenient imports for tracelens.
//!
//! Re-exports the types nearly every consumer touches:
//!
//! ```ignore
//! use tracelens::prelude::*;
//!
//! let tree = TraceTree::from_trace(&payload, &meta, None, &Policy::default());
//! ```

// Error handling
pub use crate::error::{Error, Result};

// Payloads and configuration
pub use tracelens_core::{
    EventId, EventPayload, OrgSlug, Policy, ProjectSlug, SpanId, TraceMeta, TracePayload,
    TraceSpace,
};

// The tree
pub use tracelens_tree::{
    path_to_node, FetchStatus, Node, NodeId, NodePath, NodeValue, TraceTree, TreeStatus,
};

// Fetch orchestration
pub use tracelens_fetch::{
    expand_to_path, BackfillOrchestrator, SubTraceRef, TraceApi, TraceQueryParams, ZoomController,
};

// Search
pub use tracelens_search::{parse_query, SearchResults, SearchTask};

// Re-export serde_json for payload construction convenience
pub use serde_json::json;
