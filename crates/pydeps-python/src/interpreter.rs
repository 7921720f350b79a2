//! Python interpreter discovery.
//!
//! The standard-library classifier needs a real interpreter. Resolution order:
//!
//! 1. Explicit `--python` flag
//! 2. `$PYDEPS_PYTHON` environment variable
//! 3. `$VIRTUAL_ENV/bin/python3` (or `python`)
//! 4. `python3` / `python` from `$PATH`
//!
//! Every attempted step is recorded so a failure can say exactly what was
//! tried.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Environment variable overriding interpreter discovery.
pub const PYTHON_ENV_VAR: &str = "PYDEPS_PYTHON";

/// Interpreter names tried inside a venv and on `$PATH`.
const PYTHON_NAMES: &[&str] = &["python3", "python"];

#[cfg(windows)]
const VENV_BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const VENV_BIN_DIR: &str = "bin";

// ============================================================================
// Error Types
// ============================================================================

/// A single step in the discovery process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryStep {
    /// Source being checked (e.g., "$PYDEPS_PYTHON", "$PATH").
    pub source: String,
    /// What was found (if anything).
    pub found: Option<PathBuf>,
    /// Why this step did not yield an interpreter.
    pub failure_reason: String,
}

impl DiscoveryStep {
    fn not_set(source: impl Into<String>) -> Self {
        DiscoveryStep {
            source: source.into(),
            found: None,
            failure_reason: "not set".to_string(),
        }
    }

    fn not_found(source: impl Into<String>) -> Self {
        DiscoveryStep {
            source: source.into(),
            found: None,
            failure_reason: "not found".to_string(),
        }
    }
}

impl std::fmt::Display for DiscoveryStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.source)?;
        if let Some(ref path) = self.found {
            write!(f, "found {} - ", path.display())?;
        }
        write!(f, "{}", self.failure_reason)
    }
}

/// Errors from interpreter discovery.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// No usable interpreter anywhere.
    #[error("{}", format_not_found(.steps))]
    NotFound { steps: Vec<DiscoveryStep> },

    /// An explicitly requested interpreter does not exist.
    #[error("Python interpreter not found at {path}")]
    MissingExplicit { path: PathBuf },
}

fn format_not_found(steps: &[DiscoveryStep]) -> String {
    let mut msg = String::from("no Python interpreter found\n\n");
    msg.push_str("Discovery attempted:\n");
    for (i, step) in steps.iter().enumerate() {
        msg.push_str(&format!("  {}. {}\n", i + 1, step));
    }
    msg.push_str("\nRemediation:\n");
    msg.push_str("  a) Pass an interpreter: pydeps resolve --python /path/to/python3 ...\n");
    msg.push_str(&format!(
        "  b) Export one: export {}=$(which python3)\n",
        PYTHON_ENV_VAR
    ));
    msg
}

/// Result type for interpreter discovery.
pub type InterpreterResult<T> = Result<T, InterpreterError>;

// ============================================================================
// Discovery
// ============================================================================

/// Where the interpreter was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    CliFlag,
    EnvVar,
    VirtualEnv,
    Path,
}

impl std::fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoverySource::CliFlag => write!(f, "--python flag"),
            DiscoverySource::EnvVar => write!(f, "${}", PYTHON_ENV_VAR),
            DiscoverySource::VirtualEnv => write!(f, "$VIRTUAL_ENV"),
            DiscoverySource::Path => write!(f, "$PATH"),
        }
    }
}

/// A discovered interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub path: PathBuf,
    pub source: DiscoverySource,
}

/// Find an interpreter, honoring an explicit path first.
pub fn discover(explicit: Option<&Path>) -> InterpreterResult<Interpreter> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(InterpreterError::MissingExplicit {
                path: path.to_path_buf(),
            });
        }
        return Ok(Interpreter {
            path: path.to_path_buf(),
            source: DiscoverySource::CliFlag,
        });
    }

    let mut steps = vec![DiscoveryStep::not_set("--python flag")];

    match std::env::var_os(PYTHON_ENV_VAR) {
        Some(value) => {
            let path = PathBuf::from(value);
            if path.exists() {
                return Ok(found(path, DiscoverySource::EnvVar));
            }
            steps.push(DiscoveryStep {
                source: format!("${}", PYTHON_ENV_VAR),
                found: Some(path),
                failure_reason: "path does not exist".to_string(),
            });
        }
        None => steps.push(DiscoveryStep::not_set(format!("${}", PYTHON_ENV_VAR))),
    }

    match std::env::var_os("VIRTUAL_ENV") {
        Some(venv) => {
            let bin = PathBuf::from(venv).join(VENV_BIN_DIR);
            match PYTHON_NAMES.iter().map(|name| bin.join(name)).find(|p| p.exists()) {
                Some(path) => return Ok(found(path, DiscoverySource::VirtualEnv)),
                None => steps.push(DiscoveryStep::not_found("$VIRTUAL_ENV")),
            }
        }
        None => steps.push(DiscoveryStep::not_set("$VIRTUAL_ENV")),
    }

    for name in PYTHON_NAMES {
        if let Ok(path) = which::which(name) {
            return Ok(found(path, DiscoverySource::Path));
        }
    }
    steps.push(DiscoveryStep::not_found("$PATH (python3/python)"));

    Err(InterpreterError::NotFound { steps })
}

fn found(path: PathBuf, source: DiscoverySource) -> Interpreter {
    debug!("using Python interpreter {} from {}", path.display(), source);
    Interpreter { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = discover(Some(Path::new("/definitely/not/python3"))).unwrap_err();
        assert!(matches!(err, InterpreterError::MissingExplicit { .. }));
    }

    #[test]
    fn explicit_existing_path_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let fake = dir.path().join("python3");
        std::fs::write(&fake, "").unwrap();
        let interpreter = discover(Some(&fake)).unwrap();
        assert_eq!(interpreter.path, fake);
        assert_eq!(interpreter.source, DiscoverySource::CliFlag);
    }

    #[test]
    fn not_found_message_lists_steps_and_remediation() {
        let err = InterpreterError::NotFound {
            steps: vec![
                DiscoveryStep::not_set("--python flag"),
                DiscoveryStep::not_found("$PATH (python3/python)"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("1. --python flag: not set"));
        assert!(msg.contains("2. $PATH (python3/python): not found"));
        assert!(msg.contains(PYTHON_ENV_VAR));
    }

    #[test]
    fn source_display() {
        assert_eq!(DiscoverySource::Path.to_string(), "$PATH");
        assert_eq!(DiscoverySource::EnvVar.to_string(), "$PYDEPS_PYTHON");
    }
}
