// Engine lifecycle error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Engine error code constants
///
/// Error code range: 4001-4003
pub struct EngineErrorCodes {}

impl EngineErrorCodes {
    /// Ingress worker is already running
    pub const ALREADY_RUNNING: i32 = 4001;

    /// Ingress worker is not running
    pub const NOT_RUNNING: i32 = 4002;

    /// Engine lock was poisoned
    pub const LOCK_POISONED: i32 = 4003;
}

/// Log an engine error with structured context
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, component=TrackerHandle, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Ingress worker lifecycle errors
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    AlreadyRunning,
    NotRunning,
    LockPoisoned { component: String },
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::AlreadyRunning => EngineErrorCodes::ALREADY_RUNNING,
            EngineError::NotRunning => EngineErrorCodes::NOT_RUNNING,
            EngineError::LockPoisoned { .. } => EngineErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::AlreadyRunning => {
                "Ingress already running. Call stop_ingress() first.".to_string()
            }
            EngineError::NotRunning => {
                "Ingress not running. Call start_ingress() first.".to_string()
            }
            EngineError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}
