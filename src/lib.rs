//! # Tracelens
//!
//! In-memory trace tree model for a distributed-tracing visualization
//! front end.
//!
//! A trace arrives as a forest of transactions with embedded errors and
//! performance issues; spans arrive later, lazily, one transaction at a
//! time. Tracelens assembles all of it into one navigable tree, keeps a
//! flattened visible-row projection continuously consistent for a
//! virtualized renderer, and mutates the tree in place as the user
//! expands, zooms, searches and backfills.
//!
//! ## Quick start
//!
//! ```ignore
//! use tracelens::prelude::*;
//!
//! // Build the tree from an already-fetched payload.
//! let tree = TraceTree::from_trace(&payload, &meta, None, &Policy::default());
//!
//! // Render rows.
//! for &row in tree.list() {
//!     let node = tree.node(row);
//!     println!("{:indent$}{}", "", node.value.kind(), indent = tree.depth_of(row).max(0) as usize);
//! }
//!
//! // Zoom a transaction in, fetching its spans on first use.
//! let tree = parking_lot::Mutex::new(tree);
//! let zoom = ZoomController::new(api, "my-org".into(), Policy::default());
//! zoom.zoom_in(&tree, node, true).await?;
//! ```
//!
//! ## Crates
//!
//! - [`tracelens_core`] - payload types, time space, policy knobs
//! - [`tracelens_tree`] - the node arena, construction, structural passes
//! - [`tracelens_fetch`] - zoom state machine, request dedup, backfill
//! - [`tracelens_search`] - time-sliced query evaluation

#![warn(missing_docs)]

mod error;

pub mod prelude;

pub use error::{Error, Result};

pub use tracelens_core as model;
pub use tracelens_fetch as fetch;
pub use tracelens_search as search;
pub use tracelens_tree as tree;
