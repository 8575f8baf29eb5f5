//! Non-fatal diagnostics recorded when a stage falls back
//!
//! A degradation is not an error: the stage still produced a usable
//! result, just not the one that was asked for. Every degradation is also
//! emitted as a `tracing::warn!` event at the point where it happens.

use serde::Serialize;
use std::fmt;

/// A recovered failure inside the interpolation or classification stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// An estimator declined and the next one in the chain was used.
    InterpolationDegraded {
        from: String,
        to: String,
        reason: String,
    },
    /// The boundary could not be applied; the unclipped surface was classified.
    ClippingDegraded { reason: String },
}

impl Degradation {
    pub fn interpolation(from: &str, to: &str, reason: impl Into<String>) -> Self {
        Self::InterpolationDegraded {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    pub fn clipping(reason: impl Into<String>) -> Self {
        Self::ClippingDegraded {
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InterpolationDegraded { .. } => "interpolation_degraded",
            Self::ClippingDegraded { .. } => "clipping_degraded",
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterpolationDegraded { from, to, reason } => {
                write!(f, "{} failed ({}), fell back to {}", from, reason, to)
            }
            Self::ClippingDegraded { reason } => {
                write!(f, "boundary clipping skipped: {}", reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let d = Degradation::interpolation("kriging", "idw", "singular system");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "interpolation_degraded");
        assert_eq!(json["from"], "kriging");
        assert_eq!(json["to"], "idw");
        assert_eq!(d.kind(), "interpolation_degraded");
    }

    #[test]
    fn display_mentions_reason() {
        let d = Degradation::clipping("boundary does not overlap raster");
        assert!(d.to_string().contains("does not overlap"));
    }
}
