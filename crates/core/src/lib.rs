//! Core data model for the tracelens trace tree.
//!
//! This crate defines the fundamental types shared by the tree, fetch and
//! search crates:
//! - Identifier newtypes ([`SpanId`], [`EventId`], [`ProjectSlug`], [`OrgSlug`])
//! - [`TraceSpace`]: the `[start, duration]` time pair in milliseconds
//! - Raw payload types as delivered by the API collaborator
//! - [`Policy`]: tunable structural constants (gap threshold, autogroup
//!   minimums, batch sizes)
//!
//! No tree logic lives here; this crate is the vocabulary everything else
//! speaks.

#![warn(missing_docs)]

pub mod error;
pub mod payload;
pub mod policy;
pub mod types;
pub mod vitals;

pub use error::{CoreError, Result};
pub use payload::{
    Entry, EventPayload, Measurement, PerformanceIssuePayload, RawSpan, ReplayRecord, Severity,
    TraceErrorPayload, TraceMeta, TracePayload, TransactionPayload,
};
pub use policy::Policy;
pub use types::{EventId, OrgSlug, ProjectSlug, SpanId, TraceSpace};
pub use vitals::{CollectedVital, Indicator, VitalKind};
