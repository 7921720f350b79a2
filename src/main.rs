//! Binary entry point for the pydeps CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Resolve every rule in a request, writing JSON to stdout
//! pydeps resolve --request rules.json --manifest gazelle_python.json
//!
//! # Explain where one dependency came from
//! pydeps resolve --request rules.json --explain @pip//numpy
//!
//! # Build a manifest from a wheel listing
//! pydeps manifest generate --wheels wheels.json --pip-repository pip \
//!     --requirements requirements.txt --out gazelle_python.json
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use pydeps::cli::{
    emit_targets, generate_manifest, load_third_party, resolve_request, OutputFormat,
    ResolveOptions, ResolveRequest,
};
use pydeps::error::{OutputErrorCode, PydepsError};
use pydeps::output::{emit_response, ErrorResponse};
use pydeps::python::interpreter::discover;
use pydeps::python::resolve::EXPLAIN_TARGET;
use pydeps::python::stdlib::InterpreterClassifier;

/// Environment variable naming a dependency to explain.
const EXPLAIN_ENV_VAR: &str = "EXPLAIN_DEPENDENCY";

// ============================================================================
// CLI Structure
// ============================================================================

/// Deterministic dependency resolution for generated Python build targets.
#[derive(Parser, Debug)]
#[command(name = "pydeps", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output (overridden by RUST_LOG).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the deps of every rule in a request file.
    Resolve {
        /// Request file (directives and generated rules).
        #[arg(long)]
        request: PathBuf,

        /// Third-party manifest file.
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Requirements file the manifest integrity is checked against.
        #[arg(long, requires = "manifest")]
        requirements: Option<PathBuf>,

        /// Python interpreter used for standard-library classification.
        #[arg(long)]
        python: Option<PathBuf>,

        /// Explain how this dependency label was produced.
        #[arg(long)]
        explain: Option<String>,

        /// Write output here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Worker threads (default: one per core).
        #[arg(long)]
        jobs: Option<usize>,
    },

    /// Third-party manifest operations.
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Subcommand, Debug)]
enum ManifestAction {
    /// Generate a manifest from a wheel listing.
    Generate {
        /// JSON object mapping each distribution to its wheel file paths.
        #[arg(long)]
        wheels: PathBuf,

        /// Name of the pip repository that hosts the distributions.
        #[arg(long, default_value = "pip")]
        pip_repository: String,

        /// Requirements file hashed into the manifest integrity.
        #[arg(long)]
        requirements: Option<PathBuf>,

        /// Write the manifest here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    let explain = match &cli.command {
        Command::Resolve { explain, .. } => explain
            .clone()
            .or_else(|| std::env::var(EXPLAIN_ENV_VAR).ok())
            .filter(|dep| !dep.is_empty()),
        Command::Manifest { .. } => None,
    };
    init_tracing(&cli.global, explain.is_some());

    match execute(cli.command, explain) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like successful responses
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(global: &GlobalArgs, explain: bool) {
    use tracing_subscriber::EnvFilter;

    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(global.log_level.to_tracing_level().to_string()));
    if explain {
        if let Ok(directive) = format!("{}=info", EXPLAIN_TARGET).parse() {
            filter = filter.add_directive(directive);
        }
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match global.log_format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Execute the CLI command.
fn execute(command: Command, explain: Option<String>) -> Result<(), PydepsError> {
    match command {
        Command::Resolve {
            request,
            manifest,
            requirements,
            python,
            explain: _,
            out,
            format,
            jobs,
        } => {
            if jobs == Some(0) {
                return Err(PydepsError::invalid_args("--jobs must be at least 1"));
            }
            let request = ResolveRequest::load(&request)?;
            let third_party = load_third_party(manifest.as_deref(), requirements.as_deref())?;
            let interpreter = discover(python.as_deref())?;
            debug!(
                "classifying with {} ({})",
                interpreter.path.display(),
                interpreter.source
            );
            let classifier = InterpreterClassifier::new(interpreter.path);

            let options = ResolveOptions { explain, jobs };
            let targets = resolve_request(&request, &third_party, &classifier, &options)?;
            debug!(
                "resolved {} targets, {} standard-library answers cached",
                targets.len(),
                classifier.cached()
            );
            emit_targets(&targets, format, out.as_deref())
        }
        Command::Manifest {
            action:
                ManifestAction::Generate {
                    wheels,
                    pip_repository,
                    requirements,
                    out,
                },
        } => generate_manifest(
            &wheels,
            &pip_repository,
            requirements.as_deref(),
            out.as_deref(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn resolve_flags_parse() {
        let cli = Cli::try_parse_from([
            "pydeps",
            "resolve",
            "--request",
            "rules.json",
            "--format",
            "build",
            "--jobs",
            "4",
            "--log-level",
            "debug",
        ])
        .unwrap();
        match cli.command {
            Command::Resolve { format, jobs, .. } => {
                assert_eq!(format, OutputFormat::Build);
                assert_eq!(jobs, Some(4));
            }
            Command::Manifest { .. } => panic!("expected resolve"),
        }
    }

    #[test]
    fn requirements_need_a_manifest() {
        let result = Cli::try_parse_from([
            "pydeps",
            "resolve",
            "--request",
            "rules.json",
            "--requirements",
            "requirements.txt",
        ]);
        assert!(result.is_err());
    }
}
