//! JSON output types for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (targets sorted by label,
//!    dependencies sorted lexicographically)
//! 3. **Absent vs empty:** a target with no dependencies has no `deps` field
//! 4. **Versioned:** Schema version in response enables forward compatibility

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::deps::DepsAttr;
use crate::error::{OutputErrorCode, PydepsError};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

/// Resolved dependencies of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDeps {
    /// Canonical label of the target.
    pub label: String,
    /// Sorted dependency labels; omitted when the target has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<String>>,
}

impl TargetDeps {
    pub fn new(label: impl Into<String>, attr: &DepsAttr) -> Self {
        TargetDeps {
            label: label.into(),
            deps: attr.as_list().map(<[String]>::to_vec),
        }
    }
}

/// Response for a successful `resolve` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub status: String,
    pub schema_version: String,
    pub targets: Vec<TargetDeps>,
}

impl ResolveResponse {
    pub fn new(targets: Vec<TargetDeps>) -> Self {
        ResolveResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            targets,
        }
    }
}

/// Error details carried in an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
    /// Per-target import errors, when the failure is a resolution failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetErrorInfo>,
}

/// Per-target error list in an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetErrorInfo {
    pub label: String,
    pub errors: Vec<String>,
}

impl ErrorInfo {
    pub fn from_error(err: &PydepsError) -> Self {
        let targets = match err {
            PydepsError::ResolutionFailed { targets } => targets
                .iter()
                .map(|t| TargetErrorInfo {
                    label: t.target.clone(),
                    errors: t.messages.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            targets,
        }
    }
}

/// Error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &PydepsError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}
