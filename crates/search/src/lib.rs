//! Incremental search over the visible rows of a trace tree.
//!
//! Parsing and evaluation are split so the UI can validate a query as the
//! user types and only then start the (potentially long) scan. Evaluation
//! is cooperative: bounded synchronous work per quantum, resumable state
//! across quanta, so a hundred-thousand-row trace never freezes the host
//! loop.

#![warn(missing_docs)]

mod eval;
mod expr;

pub use eval::{SearchResults, SearchTask, SliceOutcome};
pub use expr::{parse_query, Op, QueryValue, SearchExpr};
