//! Web-vital measurements and timeline indicators.

use serde::{Deserialize, Serialize};

/// Measurement kinds that render as timeline indicator markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VitalKind {
    /// Time to first byte.
    Ttfb,
    /// First contentful paint.
    Fcp,
    /// Largest contentful paint.
    Lcp,
    /// Time to initial display (mobile).
    Ttid,
    /// Time to full display (mobile).
    Ttfd,
}

impl VitalKind {
    /// Map a measurement name to a renderable vital kind.
    ///
    /// Returns `None` for measurements that are collected but not drawn on
    /// the timeline (CLS, FID, custom measurements, ...).
    pub fn from_measurement_name(name: &str) -> Option<Self> {
        match name {
            "ttfb" => Some(Self::Ttfb),
            "fcp" => Some(Self::Fcp),
            "lcp" => Some(Self::Lcp),
            "time_to_initial_display" => Some(Self::Ttid),
            "time_to_full_display" => Some(Self::Ttfd),
            _ => None,
        }
    }

    /// Short label for rendering.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ttfb => "TTFB",
            Self::Fcp => "FCP",
            Self::Lcp => "LCP",
            Self::Ttid => "TTID",
            Self::Ttfd => "TTFD",
        }
    }
}

/// One vertical marker on the trace timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    /// Marker position in milliseconds, absolute (same scale as node spaces).
    pub start: f64,
    /// Which vital this marker represents.
    pub kind: VitalKind,
    /// Measured value in milliseconds.
    pub value: f64,
}

/// One measurement collected for a node, renderable or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedVital {
    /// Measurement name as it appeared in the payload.
    pub name: String,
    /// Measured value.
    pub value: f64,
}
