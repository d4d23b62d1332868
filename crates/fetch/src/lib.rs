//! Lazy data loading for the trace tree.
//!
//! The tree renders from a partial payload and fetches the rest on demand:
//! spans when a transaction is zoomed, whole sub-traces when a backfill
//! queue drains. All network work goes through the [`TraceApi`] seam and is
//! deduplicated through a promise cache so concurrent interactions never
//! issue duplicate requests.

#![warn(missing_docs)]

mod api;
mod backfill;
mod cache;
mod error;
mod expand_path;
mod zoom;

pub use api::{TraceApi, TraceQueryParams, TraceResponse};
pub use backfill::{BackfillOrchestrator, BackfillOutcome, SubTraceRef};
pub use cache::{FetchKey, InflightCache};
pub use error::{FetchError, Result};
pub use expand_path::{expand_to_path, LocatedNode};
pub use zoom::ZoomController;
