// Pipeline module - per-sample control flow
//
// ProfileSample → active transform → continuity filter → offset → SeamOutput

pub mod orchestrator;
pub mod output;

pub use orchestrator::SeamPipeline;
pub use output::{PointKind, SeamOutput, TaggedPoint};
