//! Telemetry event types surfaced through the control surface, the CLI and
//! the HTTP `/telemetry` route.

use serde::{Deserialize, Serialize};

/// Diagnostic events emitted by the tracker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// A transform failed with a message different from the previous failure
    TransformFailure { message: String },
    TaskSelected { id: u32 },
    DefinitionsLoaded { count: usize },
    DefinitionsDumped { count: usize },
    /// The ingress queue was full; `total` counts drops since start
    IngressDropped { total: u64 },
    /// A typed error surfaced by a control or engine operation
    Error { code: i32, context: String },
}
