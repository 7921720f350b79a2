//! Standard-library classification.
//!
//! The resolver asks "is this dotted name part of the standard library?"
//! only after every other strategy has failed. The production answer comes
//! from a real interpreter: a long-lived worker process speaking JSON-lines
//! over stdin/stdout (see `std_modules.py`). Answers are memoized per module
//! name for the whole run, so each name costs at most one round trip no
//! matter how many targets import it.
//!
//! Any failure to get an answer is fatal for the run. Guessing would
//! silently turn standard-library imports into unresolved third-party ones,
//! or the reverse.

use std::collections::{BTreeSet, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Embedded worker script.
const WORKER_SCRIPT: &str = include_str!("std_modules.py");

/// How long a worker gets to exit after a shutdown request.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Error Types
// ============================================================================

/// Errors from the standard-library classifier. All of them are fatal.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The interpreter could not be started.
    #[error("failed to start Python at {path}: {reason}")]
    SpawnFailed { path: PathBuf, reason: String },

    /// The worker went away mid-conversation.
    #[error("standard library worker crashed: {reason}")]
    WorkerCrashed { reason: String },

    /// The worker answered something unexpected.
    #[error("invalid response from standard library worker: {reason}")]
    InvalidResponse { reason: String },

    /// IO error talking to the worker.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error talking to the worker.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for classifier operations.
pub type ClassifierResult<T> = Result<T, ClassifierError>;

// ============================================================================
// Classifier Trait
// ============================================================================

/// Answers whether a dotted module name belongs to the standard library.
pub trait StdlibClassifier: Send + Sync {
    fn is_standard_library(&self, module: &str) -> ClassifierResult<bool>;
}

impl<F> StdlibClassifier for F
where
    F: Fn(&str) -> ClassifierResult<bool> + Send + Sync,
{
    fn is_standard_library(&self, module: &str) -> ClassifierResult<bool> {
        self(module)
    }
}

/// Classifier backed by a fixed set of top-level module names.
#[derive(Debug, Clone, Default)]
pub struct StaticClassifier {
    top_levels: BTreeSet<String>,
}

impl StaticClassifier {
    pub fn new<I, S>(top_levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticClassifier {
            top_levels: top_levels.into_iter().map(Into::into).collect(),
        }
    }
}

impl StdlibClassifier for StaticClassifier {
    fn is_standard_library(&self, module: &str) -> ClassifierResult<bool> {
        let top = module.split('.').next().unwrap_or(module);
        Ok(self.top_levels.contains(top))
    }
}

// ============================================================================
// Worker Protocol
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReadyMessage {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    op: &'static str,
    module: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    module: String,
    is_std: bool,
}

/// A running worker process.
struct StdlibWorker {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl StdlibWorker {
    fn spawn(python: &Path) -> ClassifierResult<Self> {
        // -I: ignore PYTHON* env and user site; -S: no site-packages.
        let mut child = Command::new(python)
            .args(["-I", "-S", "-c", WORKER_SCRIPT])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ClassifierError::SpawnFailed {
                path: python.to_path_buf(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| ClassifierError::SpawnFailed {
            path: python.to_path_buf(),
            reason: "failed to capture stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ClassifierError::SpawnFailed {
            path: python.to_path_buf(),
            reason: "failed to capture stdout".to_string(),
        })?;

        let mut worker = StdlibWorker {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        };

        let ready: ReadyMessage = serde_json::from_str(&worker.read_line()?)?;
        if ready.status != "ready" {
            return Err(ClassifierError::InvalidResponse {
                reason: format!("expected ready message, got status '{}'", ready.status),
            });
        }
        debug!(
            "standard library worker ready (pid {}, Python {})",
            worker.child.id(),
            ready.version
        );
        Ok(worker)
    }

    fn read_line(&mut self) -> ClassifierResult<String> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(ClassifierError::WorkerCrashed {
                reason: "unexpected end of output".to_string(),
            });
        }
        Ok(line)
    }

    fn classify(&mut self, module: &str) -> ClassifierResult<bool> {
        let stdin = self.stdin.as_mut().ok_or_else(|| ClassifierError::WorkerCrashed {
            reason: "stdin already closed".to_string(),
        })?;
        let request = serde_json::to_string(&ClassifyRequest {
            op: "classify",
            module,
        })?;
        writeln!(stdin, "{}", request).map_err(|e| ClassifierError::WorkerCrashed {
            reason: e.to_string(),
        })?;
        stdin.flush()?;

        let response: ClassifyResponse = serde_json::from_str(&self.read_line()?)?;
        if response.module != module {
            return Err(ClassifierError::InvalidResponse {
                reason: format!(
                    "asked about '{}', got an answer for '{}'",
                    module, response.module
                ),
            });
        }
        Ok(response.is_std)
    }

    fn shutdown(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = writeln!(stdin, "{{\"op\": \"shutdown\"}}");
            let _ = stdin.flush();
        }
        match self.child.wait_timeout(SHUTDOWN_TIMEOUT) {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                warn!("standard library worker did not exit, killing it");
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
    }
}

impl Drop for StdlibWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Interpreter Classifier
// ============================================================================

#[derive(Default)]
struct ClassifierState {
    worker: Option<StdlibWorker>,
    cache: HashMap<String, bool>,
}

/// Interpreter-backed classifier with a per-run memo.
///
/// The worker is spawned lazily on the first cache miss and shut down when
/// the classifier is dropped. Queries are serialized on an internal lock.
pub struct InterpreterClassifier {
    python: PathBuf,
    state: Mutex<ClassifierState>,
}

impl InterpreterClassifier {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        InterpreterClassifier {
            python: python.into(),
            state: Mutex::new(ClassifierState::default()),
        }
    }

    /// Number of memoized answers.
    pub fn cached(&self) -> usize {
        self.state.lock().map(|s| s.cache.len()).unwrap_or(0)
    }
}

impl StdlibClassifier for InterpreterClassifier {
    fn is_standard_library(&self, module: &str) -> ClassifierResult<bool> {
        let mut state = self.state.lock().map_err(|_| ClassifierError::WorkerCrashed {
            reason: "classifier lock poisoned".to_string(),
        })?;
        if let Some(&is_std) = state.cache.get(module) {
            return Ok(is_std);
        }

        if state.worker.is_none() {
            state.worker = Some(StdlibWorker::spawn(&self.python)?);
        }
        let result = match state.worker.as_mut() {
            Some(worker) => worker.classify(module),
            None => Err(ClassifierError::WorkerCrashed {
                reason: "worker not started".to_string(),
            }),
        };
        match result {
            Ok(is_std) => {
                state.cache.insert(module.to_string(), is_std);
                Ok(is_std)
            }
            Err(err) => {
                // Never reuse a worker that failed mid-conversation.
                state.worker = None;
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for InterpreterClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterClassifier")
            .field("python", &self.python)
            .field("cached", &self.cached())
            .finish()
    }
}
