// Control surface error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Control error code constants
///
/// Error code range: 3001-3002
pub struct ControlErrorCodes {}

impl ControlErrorCodes {
    /// Offset text is not a finite number
    pub const INVALID_OFFSET: i32 = 3001;

    /// Offset RwLock was poisoned
    pub const LOCK_POISONED: i32 = 3002;
}

/// Log a control error with structured context
pub fn log_control_error(err: &ControlError, context: &str) {
    error!(
        "Control error in {}: code={}, component=ControlSurface, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by operator-facing setters that are not registry mutations
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Offset value could not be parsed as a finite float
    InvalidOffset { raw: String },

    /// Offset lock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for ControlError {
    fn code(&self) -> i32 {
        match self {
            ControlError::InvalidOffset { .. } => ControlErrorCodes::INVALID_OFFSET,
            ControlError::LockPoisoned { .. } => ControlErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            ControlError::InvalidOffset { raw } => {
                format!("Offset must be a finite number (got '{}')", raw)
            }
            ControlError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ControlError {}
