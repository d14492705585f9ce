// Seam output published once per processed sample

use serde::{Deserialize, Serialize};

use crate::profile::{Point, ProfileSample};

/// Role of a point in a published output
///
/// The numeric values are the markers downstream consumers use to separate
/// the answer from the raw profile echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Profile = 0,
    Candidate = 1,
    Seam = 2,
}

impl PointKind {
    pub fn marker(self) -> f64 {
        self as i32 as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaggedPoint {
    pub x: f64,
    pub y: f64,
    pub kind: PointKind,
}

impl TaggedPoint {
    pub fn new(point: Point, kind: PointKind) -> Self {
        Self {
            x: point.x,
            y: point.y,
            kind,
        }
    }
}

/// Offset-corrected, validity-flagged result of one cycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeamOutput {
    pub valid: bool,
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
    pub points: Vec<TaggedPoint>,
}

impl SeamOutput {
    /// Invalid, zeroed output with no points
    pub fn invalid(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }

    /// Append the raw profile as `Profile` points
    pub fn with_echo(mut self, sample: &ProfileSample) -> Self {
        self.points.extend(
            sample
                .points()
                .into_iter()
                .map(|p| TaggedPoint::new(p, PointKind::Profile)),
        );
        self
    }

    /// The `Seam` point, present only on valid outputs
    pub fn seam(&self) -> Option<&TaggedPoint> {
        self.points.iter().find(|p| p.kind == PointKind::Seam)
    }

    pub fn count(&self, kind: PointKind) -> usize {
        self.points.iter().filter(|p| p.kind == kind).count()
    }
}
