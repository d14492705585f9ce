// Profile samples - one sensing cycle of calibrated laser-line coordinates
//
// x/y are the calibrated profile; u/v carry the image-plane coordinates the
// line-center stage reports alongside them. Transforms only look at x/y.

use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// A 2D coordinate in profile space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// One timestamped profile as delivered by the sensing collaborator
///
/// A zero-length sample is the "no detection this cycle" signal, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSample {
    #[serde(default)]
    pub timestamp_ms: u64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<Vec<f64>>,
}

impl ProfileSample {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_image_coords(mut self, u: Vec<f64>, v: Vec<f64>) -> Self {
        self.u = Some(u);
        self.v = Some(v);
        self
    }

    pub fn from_points(points: &[Point]) -> Self {
        Self::new(
            points.iter().map(|p| p.x).collect(),
            points.iter().map(|p| p.y).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// No points in `x`; a sample that fails [`ProfileSample::validate`] is
    /// malformed rather than empty
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Check that every present coordinate array has the length of `x`
    pub fn validate(&self) -> Result<(), TransformError> {
        let len = self.x.len();
        let mismatch = |name: &str, other: usize| TransformError::MalformedSample {
            reason: format!("{} has {} values, x has {}", name, other, len),
        };

        if self.y.len() != len {
            return Err(mismatch("y", self.y.len()));
        }
        if let Some(u) = &self.u {
            if u.len() != len {
                return Err(mismatch("u", u.len()));
            }
        }
        if let Some(v) = &self.v {
            if v.len() != len {
                return Err(mismatch("v", v.len()));
            }
        }
        Ok(())
    }

    /// Profile as a list of (x, y) points
    pub fn points(&self) -> Vec<Point> {
        self.x
            .iter()
            .zip(self.y.iter())
            .map(|(&x, &y)| Point { x, y })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sample() {
        let sample = ProfileSample::empty();
        assert!(sample.is_empty());
        assert!(sample.validate().is_ok());
        assert!(sample.points().is_empty());
    }

    #[test]
    fn test_points_zip_coordinates() {
        let sample = ProfileSample::new(vec![0.0, 1.0], vec![5.0, 6.0]);
        assert_eq!(
            sample.points(),
            vec![Point::new(0.0, 5.0), Point::new(1.0, 6.0)]
        );
    }

    #[test]
    fn test_validate_rejects_length_mismatch() {
        let sample = ProfileSample::new(vec![0.0, 1.0], vec![5.0]);
        assert!(matches!(
            sample.validate(),
            Err(TransformError::MalformedSample { .. })
        ));

        let sample = ProfileSample::new(vec![0.0], vec![5.0])
            .with_image_coords(vec![1.0], vec![1.0, 2.0]);
        assert!(sample.validate().is_err());
    }

    #[test]
    fn test_deserialize_without_image_coords() {
        let sample: ProfileSample = serde_json::from_str(r#"{"x":[1.0],"y":[2.0]}"#).unwrap();
        assert_eq!(sample.timestamp_ms, 0);
        assert!(sample.u.is_none());
        assert_eq!(sample.len(), 1);
    }
}
