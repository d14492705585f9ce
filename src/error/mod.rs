// Error types for the seam tracker
//
// This module defines custom error types for registry, transform, control and
// engine operations, providing structured error handling with error codes
// suitable for the control surface.

mod control;
mod engine;
mod registry;
mod transform;

pub use control::{log_control_error, ControlError, ControlErrorCodes};
pub use engine::{log_engine_error, EngineError, EngineErrorCodes};
pub use registry::{log_registry_error, RegistryError, RegistryErrorCodes};
pub use transform::{
    log_transform_error, IndexError, ProgramError, TransformError, TransformErrorCodes,
};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the control boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
