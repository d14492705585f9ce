// TransformDefinition - one task's stored transform body

use serde::{Deserialize, Serialize};

/// A task id paired with the transform body that handles it
///
/// `valid` records whether the body last compiled and passed its self-test.
/// It is recomputed whenever the body changes and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDefinition {
    pub id: u32,
    pub body: String,
    #[serde(skip)]
    pub valid: bool,
}

impl TransformDefinition {
    pub fn new(id: u32, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            valid: false,
        }
    }

    /// The persisted part of the definition
    pub fn record(&self) -> (u32, &str) {
        (self.id, self.body.as_str())
    }
}
