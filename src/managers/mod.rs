// Managers Module
//
// Lock-owning wrappers shared between the sample path and the control path.
//
// Each manager handles one specific concern:
// - RegistryManager: transform registry access and persistence
// - OffsetManager: operator offsets applied to the primary pick
// - BroadcastChannelManager: seam output fan-out

pub mod broadcast_manager;
pub mod offset_manager;
pub mod registry_manager;

pub use broadcast_manager::BroadcastChannelManager;
pub use offset_manager::{parse_offset, OffsetManager};
pub use registry_manager::{CursorState, RegistryManager};
