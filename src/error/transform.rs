// Transform error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Transform error code constants
///
/// Error code range: 2001-2005, 2101 for program compilation
pub struct TransformErrorCodes {}

impl TransformErrorCodes {
    /// No transform is currently selected
    pub const NO_ACTIVE_SELECTION: i32 = 2001;

    /// Active transform failed while running
    pub const EXECUTION: i32 = 2002;

    /// Candidate index outside the candidate set
    pub const INDEX: i32 = 2003;

    /// Transform exceeded its execution budget
    pub const TIMEOUT: i32 = 2004;

    /// Profile arrays disagree in length
    pub const MALFORMED_SAMPLE: i32 = 2005;

    /// Transform body failed to compile
    pub const PROGRAM: i32 = 2101;
}

/// Log a transform error with structured context
pub fn log_transform_error(err: &TransformError, context: &str) {
    error!(
        "Transform error in {}: code={}, component=SeamPipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Out-of-range access into a candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexError {
    pub index: usize,
    pub len: usize,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "candidate index {} out of range for {} candidates",
            self.index, self.len
        )
    }
}

impl std::error::Error for IndexError {}

/// Compile failure of a transform body
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramError {
    /// 1-based source line, 0 when the whole body is at fault
    pub line: usize,
    pub reason: String,
}

impl ProgramError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ProgramError {
    fn code(&self) -> i32 {
        TransformErrorCodes::PROGRAM
    }

    fn message(&self) -> String {
        if self.line == 0 {
            self.reason.clone()
        } else {
            format!("line {}: {}", self.line, self.reason)
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ProgramError {}

/// Runtime failures while applying the active transform to one sample
///
/// The pipeline absorbs these: the cycle is reported invalid and the next
/// sample is processed normally.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Nothing has been selected yet
    NoActiveSelection,

    /// Generic stage failure
    Execution { message: String },

    /// `pick` addressed a candidate that does not exist
    Index(IndexError),

    /// Execution ran past the configured budget
    Timeout { elapsed_ms: u64, budget_ms: u64 },

    /// Coordinate arrays have different lengths
    MalformedSample { reason: String },
}

impl ErrorCode for TransformError {
    fn code(&self) -> i32 {
        match self {
            TransformError::NoActiveSelection => TransformErrorCodes::NO_ACTIVE_SELECTION,
            TransformError::Execution { .. } => TransformErrorCodes::EXECUTION,
            TransformError::Index(_) => TransformErrorCodes::INDEX,
            TransformError::Timeout { .. } => TransformErrorCodes::TIMEOUT,
            TransformError::MalformedSample { .. } => TransformErrorCodes::MALFORMED_SAMPLE,
        }
    }

    fn message(&self) -> String {
        match self {
            TransformError::NoActiveSelection => "No transform selected".to_string(),
            TransformError::Execution { message } => message.clone(),
            TransformError::Index(err) => err.to_string(),
            TransformError::Timeout {
                elapsed_ms,
                budget_ms,
            } => format!(
                "Transform took {} ms, budget is {} ms",
                elapsed_ms, budget_ms
            ),
            TransformError::MalformedSample { reason } => {
                format!("Malformed profile sample: {}", reason)
            }
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransformError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TransformError {}

impl From<IndexError> for TransformError {
    fn from(err: IndexError) -> Self {
        TransformError::Index(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_codes() {
        assert_eq!(TransformError::NoActiveSelection.code(), 2001);
        assert_eq!(
            TransformError::Execution {
                message: "boom".to_string()
            }
            .code(),
            2002
        );
        assert_eq!(
            TransformError::Index(IndexError { index: 4, len: 4 }).code(),
            2003
        );
        assert_eq!(
            TransformError::Timeout {
                elapsed_ms: 30,
                budget_ms: 20
            }
            .code(),
            2004
        );
        assert_eq!(ProgramError::new(1, "bad").code(), 2101);
    }

    #[test]
    fn test_index_error_message() {
        let err: TransformError = IndexError { index: 5, len: 2 }.into();
        assert_eq!(
            err.message(),
            "candidate index 5 out of range for 2 candidates"
        );
    }

    #[test]
    fn test_program_error_message() {
        assert_eq!(
            ProgramError::new(3, "unknown stage 'foo'").message(),
            "line 3: unknown stage 'foo'"
        );
        assert_eq!(
            ProgramError::new(0, "empty transform body").message(),
            "empty transform body"
        );
    }
}
