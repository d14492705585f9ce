use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::registry::TransformDefinition;

/// Result of a control operation that only reports success
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlOutcome {
    pub success: bool,
    /// Error code of the failure, 0 on success
    pub code: i32,
    pub message: String,
}

impl ControlOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: 0,
            message: message.into(),
        }
    }

    pub fn failed<E: ErrorCode>(err: &E) -> Self {
        Self {
            success: false,
            code: err.code(),
            message: err.message(),
        }
    }

    /// Failure that is not an error, e.g. deleting from an empty registry
    pub fn not_modified(message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: 0,
            message: message.into(),
        }
    }
}

/// Result of a control query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReply<T> {
    pub success: bool,
    pub code: i32,
    pub message: String,
    pub value: Option<T>,
}

impl<T> ControlReply<T> {
    pub fn ok(value: Option<T>) -> Self {
        Self {
            success: true,
            code: 0,
            message: String::new(),
            value,
        }
    }

    pub fn failed<E: ErrorCode>(err: &E) -> Self {
        Self {
            success: false,
            code: err.code(),
            message: err.message(),
            value: None,
        }
    }

    /// The value of a successful reply
    pub fn into_value(self) -> Option<T> {
        if self.success {
            self.value
        } else {
            None
        }
    }
}

/// A definition as shown to operators, validity included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionView {
    pub id: u32,
    pub body: String,
    pub valid: bool,
}

impl From<TransformDefinition> for DefinitionView {
    fn from(def: TransformDefinition) -> Self {
        Self {
            id: def.id,
            body: def.body,
            valid: def.valid,
        }
    }
}
