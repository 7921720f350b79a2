//! CLI front door: load a resolution request, resolve every target, emit.
//!
//! ## Request Format
//!
//! ```json
//! {
//!   "directives": { "": ["python_root"], "app": ["resolve py six //third_party:six"] },
//!   "rules": [
//!     {
//!       "label": "//app:lib",
//!       "kind": "py_library",
//!       "srcs": ["__init__.py", "util.py"],
//!       "imports": [{ "name": "numpy.random", "filepath": "app/util.py", "lineno": 3 }],
//!       "resolved_deps": []
//!     }
//!   ]
//! }
//! ```
//!
//! `imports: null` (or absent) means the target carries no import payload.
//!
//! ## Run Semantics
//!
//! Every rule is indexed before any target is resolved. Targets then
//! resolve in parallel against the frozen index. A classifier failure sets a
//! shared fatal flag; passes that have not started yet are abandoned. Nothing
//! is written unless every target resolved cleanly.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, error, info};

use pydeps_core::deps::{DependencySet, DepsAttr};
use pydeps_core::error::{PydepsError, TargetErrors};
use pydeps_core::index::RuleIndex;
use pydeps_core::label::Label;
use pydeps_core::output::{emit_response, ResolveResponse, TargetDeps};
use pydeps_python::config::Configs;
use pydeps_python::manifest::{generate_body, ManifestFile, ThirdPartyModules};
use pydeps_python::modules::{ImportRecord, Imports};
use pydeps_python::provides::provided_imports;
use pydeps_python::resolve::{Resolver, TargetFailure};
use pydeps_python::stdlib::StdlibClassifier;

// ============================================================================
// Request Types
// ============================================================================

/// Input for one `resolve` run.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    /// Directive lines keyed by package path.
    #[serde(default)]
    pub directives: BTreeMap<String, Vec<String>>,
    /// Generated rules.
    pub rules: Vec<RuleInput>,
}

/// One generated rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleInput {
    pub label: Label,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub srcs: Vec<String>,
    #[serde(default)]
    pub imports: Option<Vec<ImportRecord>>,
    /// Dependencies the generator already knows; merged without resolution.
    #[serde(default)]
    pub resolved_deps: Vec<String>,
}

impl ResolveRequest {
    /// Load and validate a request file.
    pub fn load(path: &Path) -> Result<Self, PydepsError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PydepsError::invalid_args(format!("failed to read request {}: {}", path.display(), e))
        })?;
        let request: ResolveRequest = serde_json::from_str(&text).map_err(|e| {
            PydepsError::invalid_args(format!("invalid request {}: {}", path.display(), e))
        })?;
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<(), PydepsError> {
        let mut seen = std::collections::BTreeSet::new();
        for rule in &self.rules {
            if rule.label.relative {
                return Err(PydepsError::invalid_args(format!(
                    "rule label '{}' must be absolute",
                    rule.label
                )));
            }
            if !seen.insert(&rule.label) {
                return Err(PydepsError::invalid_args(format!(
                    "duplicate rule '{}'",
                    rule.label
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Knobs for a `resolve` run.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Dependency label to explain.
    pub explain: Option<String>,
    /// Worker threads; `None` lets rayon decide.
    pub jobs: Option<usize>,
}

/// Final `deps` of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub label: Label,
    pub deps: DepsAttr,
}

/// Index every rule's provided imports.
pub fn build_index(request: &ResolveRequest, configs: &Configs) -> RuleIndex {
    let mut index = RuleIndex::new();
    for rule in &request.rules {
        let scope = configs.scope_for(&rule.label.pkg);
        if let Some(specs) = provided_imports(&scope.project_root, &rule.label.pkg, &rule.srcs) {
            index.add_rule(&rule.label, specs);
        }
    }
    index.finish();
    debug!("indexed {} import specs", index.len());
    index
}

/// Resolve every target of `request`.
///
/// Returns targets sorted by label, or the first fatal error, or every
/// target's accumulated import errors.
pub fn resolve_request(
    request: &ResolveRequest,
    third_party: &ThirdPartyModules,
    classifier: &dyn StdlibClassifier,
    options: &ResolveOptions,
) -> Result<Vec<ResolvedTarget>, PydepsError> {
    let configs = Configs::from_directives(&request.directives)?;
    let index = build_index(request, &configs);
    let resolver =
        Resolver::new(&index, third_party, classifier).with_explain(options.explain.clone());
    let fatal = AtomicBool::new(false);

    let resolve_one = |rule: &RuleInput| -> Option<Result<DependencySet, TargetFailure>> {
        if fatal.load(Ordering::SeqCst) {
            return None;
        }
        let scope = configs.scope_for(&rule.label.pkg);
        let imports = Imports::from(rule.imports.clone());
        let pre_resolved: DependencySet = rule.resolved_deps.iter().map(String::as_str).collect();
        let result = resolver.resolve_target(&rule.label, scope, &imports, &pre_resolved);
        if matches!(result, Err(TargetFailure::Classifier { .. })) {
            fatal.store(true, Ordering::SeqCst);
        }
        Some(result)
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.unwrap_or(0))
        .build()
        .map_err(|e| PydepsError::internal(format!("failed to start worker pool: {}", e)))?;
    let results: Vec<Option<Result<DependencySet, TargetFailure>>> =
        pool.install(|| request.rules.par_iter().map(resolve_one).collect());

    collect_results(request, results)
}

fn collect_results(
    request: &ResolveRequest,
    results: Vec<Option<Result<DependencySet, TargetFailure>>>,
) -> Result<Vec<ResolvedTarget>, PydepsError> {
    let mut resolved = Vec::new();
    let mut failed = Vec::new();
    let mut fatal = None;
    let mut abandoned = 0usize;

    for (rule, result) in request.rules.iter().zip(results) {
        match result {
            None => abandoned += 1,
            Some(Ok(deps)) => resolved.push(ResolvedTarget {
                label: rule.label.clone(),
                deps: deps.into_attr(),
            }),
            Some(Err(TargetFailure::Imports { target, errors })) => {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                for message in &messages {
                    error!(target_label = %target, "{}", message);
                }
                failed.push(TargetErrors {
                    target: target.to_string(),
                    messages,
                });
            }
            Some(Err(err @ TargetFailure::Classifier { .. })) => {
                error!("{}", err);
                fatal.get_or_insert(err);
            }
        }
    }

    if let Some(err) = fatal {
        if abandoned > 0 {
            info!("abandoned {} target(s) after a fatal error", abandoned);
        }
        return Err(err.into());
    }
    if !failed.is_empty() {
        failed.sort_by(|a, b| a.target.cmp(&b.target));
        return Err(PydepsError::ResolutionFailed { targets: failed });
    }

    resolved.sort_by(|a, b| a.label.to_string().cmp(&b.label.to_string()));
    Ok(resolved)
}

// ============================================================================
// Output
// ============================================================================

/// How resolved targets are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON envelope.
    #[default]
    Json,
    /// One Starlark `deps` block per target.
    Build,
}

/// Render resolved targets in `format` to `writer`.
pub fn write_targets(
    targets: &[ResolvedTarget],
    format: OutputFormat,
    writer: &mut impl Write,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Json => {
            let response = ResolveResponse::new(
                targets
                    .iter()
                    .map(|t| TargetDeps::new(t.label.to_string(), &t.deps))
                    .collect(),
            );
            emit_response(&response, writer)
        }
        OutputFormat::Build => {
            for target in targets {
                writeln!(writer, "# {}", target.label)?;
                if let Some(rendered) = target.deps.render("") {
                    writeln!(writer, "{}", rendered)?;
                }
            }
            Ok(())
        }
    }
}

/// Write `targets` to `out` atomically, or to stdout when `out` is `None`.
pub fn emit_targets(
    targets: &[ResolvedTarget],
    format: OutputFormat,
    out: Option<&Path>,
) -> Result<(), PydepsError> {
    let Some(out) = out else {
        let mut stdout = std::io::stdout().lock();
        return write_targets(targets, format, &mut stdout)
            .map_err(|e| PydepsError::internal(format!("failed to write output: {}", e)));
    };
    write_atomically(out, |file| write_targets(targets, format, file))
}

fn write_atomically(
    out: &Path,
    write: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>,
) -> Result<(), PydepsError> {
    let dir = match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |e: std::io::Error| {
        PydepsError::internal(format!("failed to write {}: {}", out.display(), e))
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    write(tmp.as_file_mut()).map_err(io_err)?;
    tmp.persist(out).map_err(|e| io_err(e.error))?;
    Ok(())
}

// ============================================================================
// Manifest Generation
// ============================================================================

/// Load a manifest and, when given, check it against its requirements file.
pub fn load_third_party(
    manifest: Option<&Path>,
    requirements: Option<&Path>,
) -> Result<ThirdPartyModules, PydepsError> {
    let Some(manifest_path) = manifest else {
        return Ok(ThirdPartyModules::default());
    };
    let manifest = ManifestFile::load(manifest_path)?;
    if let Some(requirements) = requirements {
        let bytes = read_bytes(requirements)?;
        manifest.verify_integrity(&bytes)?;
    }
    let modules = ThirdPartyModules::from_manifest(&manifest);
    debug!("loaded {} third-party modules", modules.len());
    Ok(modules)
}

/// Build a manifest from a wheel listing (`{distribution: [paths]}`).
pub fn generate_manifest(
    wheels: &Path,
    pip_repository: &str,
    requirements: Option<&Path>,
    out: Option<&Path>,
) -> Result<(), PydepsError> {
    let text = std::fs::read_to_string(wheels).map_err(|e| {
        PydepsError::invalid_args(format!("failed to read {}: {}", wheels.display(), e))
    })?;
    let listing: BTreeMap<String, Vec<String>> = serde_json::from_str(&text).map_err(|e| {
        PydepsError::invalid_args(format!("invalid wheel listing {}: {}", wheels.display(), e))
    })?;
    let body = generate_body(&listing, pip_repository)?;
    let requirements = match requirements {
        Some(path) => read_bytes(path)?,
        None => Vec::new(),
    };
    let manifest = ManifestFile::new(body, &requirements)?;
    info!(
        "generated manifest with {} modules",
        manifest.manifest.modules_mapping.len()
    );

    match out {
        Some(out) => write_atomically(out, |file| emit_response(&manifest, file)),
        None => emit_response(&manifest, &mut std::io::stdout().lock())
            .map_err(|e| PydepsError::internal(format!("failed to write output: {}", e))),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, PydepsError> {
    std::fs::read(path).map_err(|e| {
        PydepsError::invalid_args(format!("failed to read {}: {}", path.display(), e))
    })
}
