//! Bridges from Python-side domain errors into `PydepsError`.

use pydeps_core::error::{PydepsError, TargetErrors};

use crate::config::DirectiveError;
use crate::interpreter::InterpreterError;
use crate::manifest::ManifestError;
use crate::resolve::TargetFailure;
use crate::stdlib::ClassifierError;

impl From<DirectiveError> for PydepsError {
    fn from(err: DirectiveError) -> Self {
        PydepsError::invalid_args(err.to_string())
    }
}

impl From<ManifestError> for PydepsError {
    fn from(err: ManifestError) -> Self {
        PydepsError::invalid_args(err.to_string())
    }
}

impl From<InterpreterError> for PydepsError {
    fn from(err: InterpreterError) -> Self {
        match err {
            // A bad `--python` is a usage error, not a classification failure.
            InterpreterError::MissingExplicit { .. } => PydepsError::invalid_args(err.to_string()),
            InterpreterError::NotFound { .. } => PydepsError::ClassifierFailed {
                message: err.to_string(),
            },
        }
    }
}

impl From<ClassifierError> for PydepsError {
    fn from(err: ClassifierError) -> Self {
        PydepsError::ClassifierFailed {
            message: err.to_string(),
        }
    }
}

impl From<TargetFailure> for PydepsError {
    fn from(err: TargetFailure) -> Self {
        match err {
            TargetFailure::Imports { target, errors } => PydepsError::ResolutionFailed {
                targets: vec![TargetErrors {
                    target: target.to_string(),
                    messages: errors.iter().map(|e| e.to_string()).collect(),
                }],
            },
            TargetFailure::Classifier { target, source } => PydepsError::ClassifierFailed {
                message: format!("{} (while resolving {})", source, target),
            },
        }
    }
}
