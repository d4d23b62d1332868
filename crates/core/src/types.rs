//! Identifier newtypes and the trace time space.
//!
//! All identifiers arrive as opaque strings in API payloads. They are wrapped
//! in newtypes so the tree, fetch and search layers cannot confuse a span id
//! with an event id.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

string_id! {
    /// Identifier of a single span within a transaction.
    SpanId
}

string_id! {
    /// Identifier of an event (transaction or error occurrence).
    EventId
}

string_id! {
    /// URL-safe slug of the project an event belongs to.
    ///
    /// Together with an [`EventId`] this forms the cache key for span
    /// fetches.
    ProjectSlug
}

string_id! {
    /// URL-safe slug of the owning organization.
    OrgSlug
}

/// A `[start, duration]` pair in milliseconds.
///
/// Every node in the tree carries exactly one `TraceSpace`. Raw payload
/// timestamps are seconds; the conversion to milliseconds happens exactly
/// once, at node construction, so mixed-precision inputs cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSpace {
    /// Start offset in milliseconds.
    pub start: f64,
    /// Duration in milliseconds. Zero for instantaneous events.
    pub duration: f64,
}

impl TraceSpace {
    /// An empty space at the origin.
    pub const ZERO: TraceSpace = TraceSpace { start: 0.0, duration: 0.0 };

    /// Create a space from start/duration in milliseconds.
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// Create a space from start/end timestamps in seconds.
    ///
    /// Returns [`TraceSpace::ZERO`] when neither bound is usable, and a
    /// zero-duration space when only a point timestamp is known.
    pub fn from_seconds(start: Option<f64>, end: Option<f64>) -> Self {
        match (start, end) {
            (Some(s), Some(e)) => Self::new(s * 1000.0, (e - s).max(0.0) * 1000.0),
            (Some(s), None) => Self::new(s * 1000.0, 0.0),
            (None, Some(e)) => Self::new(e * 1000.0, 0.0),
            (None, None) => Self::ZERO,
        }
    }

    /// End offset in milliseconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Widen this space so it also covers `other`. Never narrows.
    pub fn widen_to_include(&mut self, other: TraceSpace) -> bool {
        if self.covers(other) {
            return false;
        }
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        let mut duration = end - start;
        // `start + (end - start)` can round below `end` at large magnitudes,
        // which would leave the recovered end short of the union. Nudge the
        // stored duration up by ulps until `end()` covers it.
        while start + duration < end {
            duration = f64::from_bits(duration.to_bits() + 1);
        }
        self.start = start;
        self.duration = duration;
        true
    }

    /// Whether this space fully covers `other`.
    pub fn covers(&self, other: TraceSpace) -> bool {
        self.start <= other.start && self.end() >= other.end()
    }
}
