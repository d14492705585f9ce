// Transform module - converting a profile into seam candidates
//
// - segmentation: the deterministic run/endpoint algorithm and `pick`
// - program: the editable stage language that task bodies are written in
//
// By convention the first point a transform returns is the primary pick.

pub mod program;
pub mod segmentation;

pub use program::{Stage, TransformProgram, DEFAULT_TRANSFORM_BODY};
pub use segmentation::{pick, run_endpoints, segment, segment_points, Run};

use crate::error::TransformError;
use crate::profile::{Point, ProfileSample};

/// Anything that can turn a profile into seam candidates
///
/// Implemented by the registry (through its active selection) so the
/// pipeline can be driven by a fixed program in tests.
pub trait SeamTransform: Send + Sync {
    fn transform(&self, sample: &ProfileSample) -> Result<Vec<Point>, TransformError>;
}

impl SeamTransform for TransformProgram {
    fn transform(&self, sample: &ProfileSample) -> Result<Vec<Point>, TransformError> {
        self.run(sample, None)
    }
}
