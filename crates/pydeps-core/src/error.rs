//! Error types and exit codes for pydeps.
//!
//! This module provides the unified error type (`PydepsError`) that
//! subsystem errors (manifest loading, classifier failures, per-import
//! resolution errors) are bridged into before being reported.
//!
//! ## Exit Codes
//!
//! - `2`: Invalid arguments or unreadable inputs
//! - `3`: Resolution failed (unresolved or ambiguous imports)
//! - `4`: Standard-library classification could not be performed
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes; these are also the process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments or malformed input files.
    InvalidArguments = 2,
    /// One or more targets have unresolved or ambiguous imports.
    ResolutionFailed = 3,
    /// The standard-library classifier failed.
    ClassifierFailed = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the CLI.
#[derive(Debug, Error)]
pub enum PydepsError {
    /// Invalid arguments or input files.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Targets failed to resolve. Each message is one rendered per-import error.
    #[error("failed to resolve dependencies for {} target(s)", .targets.len())]
    ResolutionFailed { targets: Vec<TargetErrors> },

    /// The standard-library check could not be performed.
    #[error("standard library classification failed: {message}")]
    ClassifierFailed { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

/// Rendered per-import errors for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetErrors {
    /// Canonical label of the failing target.
    pub target: String,
    /// One message per failed import.
    pub messages: Vec<String>,
}

impl From<&PydepsError> for OutputErrorCode {
    fn from(err: &PydepsError) -> Self {
        match err {
            PydepsError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            PydepsError::ResolutionFailed { .. } => OutputErrorCode::ResolutionFailed,
            PydepsError::ClassifierFailed { .. } => OutputErrorCode::ClassifierFailed,
            PydepsError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl PydepsError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        PydepsError::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PydepsError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_values_are_stable() {
        assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
        assert_eq!(OutputErrorCode::ResolutionFailed.code(), 3);
        assert_eq!(OutputErrorCode::ClassifierFailed.code(), 4);
        assert_eq!(OutputErrorCode::InternalError.code(), 10);
    }

    #[test]
    fn errors_map_to_codes() {
        let err = PydepsError::ResolutionFailed { targets: vec![] };
        assert_eq!(err.error_code(), OutputErrorCode::ResolutionFailed);
        let err = PydepsError::ClassifierFailed {
            message: "spawn failed".to_string(),
        };
        assert_eq!(err.error_code().code(), 4);
        assert_eq!(
            PydepsError::invalid_args("bad").error_code(),
            OutputErrorCode::InvalidArguments
        );
    }

    #[test]
    fn resolution_failed_display_counts_targets() {
        let err = PydepsError::ResolutionFailed {
            targets: vec![
                TargetErrors {
                    target: "//a:lib".to_string(),
                    messages: vec!["x".to_string()],
                },
                TargetErrors {
                    target: "//b:lib".to_string(),
                    messages: vec!["y".to_string()],
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "failed to resolve dependencies for 2 target(s)"
        );
    }
}
