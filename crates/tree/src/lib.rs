//! The trace tree model.
//!
//! This crate owns the hard part of the trace view: an arena of typed nodes
//! assembled from transaction/span/error payloads, the flattened visible-row
//! projection consumed by a virtualized renderer, and the structural passes
//! that rewrite the tree (autogrouping, missing-instrumentation markers,
//! reparenting heuristics).
//!
//! ## Ownership model
//!
//! Nodes live in a flat arena (`Vec<Node>`) indexed by [`NodeId`]. Parent
//! links are plain ids, which makes them naturally non-owning; child lists
//! own their entries in render order. Structural substitutions (a parent
//! autogroup wrapping a span chain) are index swaps performed atomically
//! within one `&mut` call, so there is never a half-updated cyclic state.
//!
//! ## Dual children views
//!
//! A transaction node carries two separately-owned child lists: nested
//! transactions (the coarse view) and fetched spans (the zoomed view).
//! [`TraceTree::children_of`] resolves which list is visible from the node
//! kind and zoom state; traversal code never branches on kind itself.

#![warn(missing_docs)]

mod events;
mod node;
mod path;
mod spans;
mod transforms;
mod tree;

pub use events::SubscriptionId;
pub use node::{FetchStatus, Node, NodeId, NodeMetadata, NodeValue, ReparentReason};
pub use path::{path_to_node, NodePath};
pub use transforms::{
    autogroup_direct_children, autogroup_siblings, collapse_non_issue_subtrees,
    detect_missing_instrumentation, remove_missing_instrumentation,
};
pub use tree::{TraceTree, TreeStatus};
