// Registry error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Registry error code constants
///
/// Single source of truth for the codes reported through the control
/// surface when a registry mutation fails.
///
/// Error code range: 1001-1007
pub struct RegistryErrorCodes {}

impl RegistryErrorCodes {
    /// Persisted definitions are missing or corrupt
    pub const LOAD: i32 = 1001;

    /// Persisting definitions failed
    pub const IO: i32 = 1002;

    /// Candidate definition failed to compile or self-test
    pub const SELECTION: i32 = 1003;

    /// No definition with the requested id
    pub const UNKNOWN_TASK: i32 = 1004;

    /// Two definitions share one id
    pub const DUPLICATE_ID: i32 = 1005;

    /// Registry RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Task id outside the representable range (negative or too large)
    pub const INVALID_TASK_ID: i32 = 1007;
}

/// Log a registry error with structured context
///
/// Emits error_code, component and message fields so repeated failures can be
/// grepped out of the node log.
pub fn log_registry_error(err: &RegistryError, context: &str) {
    error!(
        "Registry error in {}: code={}, component=TransformRegistry, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Transform registry errors
///
/// These cover loading, persisting, selecting and editing transform
/// definitions. All of them are recoverable; a failed operation never
/// changes the active selection.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Storage is missing or could not be parsed
    Load { reason: String },

    /// Storage could not be written
    Io { reason: String },

    /// Definition exists but failed to compile or execute its self-test
    Selection { id: u32, reason: String },

    /// No definition with this id
    UnknownTask { id: u32 },

    /// Duplicate id in a loaded or replaced collection
    DuplicateId { id: u32 },

    /// Registry lock was poisoned by a panicking writer
    LockPoisoned { component: String },

    /// Requested id cannot name a task
    InvalidTaskId { raw: i64 },
}

impl ErrorCode for RegistryError {
    fn code(&self) -> i32 {
        match self {
            RegistryError::Load { .. } => RegistryErrorCodes::LOAD,
            RegistryError::Io { .. } => RegistryErrorCodes::IO,
            RegistryError::Selection { .. } => RegistryErrorCodes::SELECTION,
            RegistryError::UnknownTask { .. } => RegistryErrorCodes::UNKNOWN_TASK,
            RegistryError::DuplicateId { .. } => RegistryErrorCodes::DUPLICATE_ID,
            RegistryError::LockPoisoned { .. } => RegistryErrorCodes::LOCK_POISONED,
            RegistryError::InvalidTaskId { .. } => RegistryErrorCodes::INVALID_TASK_ID,
        }
    }

    fn message(&self) -> String {
        match self {
            RegistryError::Load { reason } => format!("Failed to load definitions: {}", reason),
            RegistryError::Io { reason } => format!("Failed to write definitions: {}", reason),
            RegistryError::Selection { id, reason } => {
                format!("Task {} cannot be selected: {}", id, reason)
            }
            RegistryError::UnknownTask { id } => format!("Task {} does not exist", id),
            RegistryError::DuplicateId { id } => format!("Duplicate task id {}", id),
            RegistryError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
            RegistryError::InvalidTaskId { raw } => format!("Invalid task id {}", raw),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegistryError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RegistryError {}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io {
            reason: err.to_string(),
        }
    }
}
