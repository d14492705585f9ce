// Seam Tracker Core - weld seam coordinate extraction
// Per-sample pipeline: operator-selected transform, continuity gate, offsets

// Module declarations
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod http;
pub mod managers;
pub mod pipeline;
pub mod profile;
pub mod registry;
pub mod telemetry;
pub mod transform;

// Re-exports for convenience
pub use api::{ControlOutcome, ControlReply, ControlSurface, DefinitionView};
pub use config::AppConfig;
pub use engine::{ProfileSender, TrackerHandle};
pub use pipeline::{PointKind, SeamOutput, TaggedPoint};
pub use profile::{Point, ProfileSample};
