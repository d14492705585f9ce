// Public control API
//
// Request/response operations used by operators (CLI, HTTP) to drive a
// running tracker: task selection, offsets, definition editing, traversal
// and storage.

mod control;
mod types;

pub use control::ControlSurface;
pub use types::{ControlOutcome, ControlReply, DefinitionView};

pub use crate::error::{ControlErrorCodes, EngineErrorCodes, RegistryErrorCodes, TransformErrorCodes};
pub use crate::managers::CursorState;
