//! Dependency resolution for generated Python targets.
//!
//! For each import of a target the resolver walks the fallback sequence
//! (`foo.bar.baz`, `foo.bar`, `foo`) and, for each candidate, tries in
//! strict precedence order:
//!
//! 1. the scope's Override Table (always wins, never second-guessed),
//! 2. the Third-Party Module Map,
//! 3. the Import Index, disambiguated by project root.
//!
//! Only when no candidate resolves is the standard-library classifier
//! consulted, and always with the *original* module name. Unresolvable
//! imports are errors only when the scope validates import statements.
//!
//! The shared structures are read-only references, so a single [`Resolver`]
//! can serve many targets concurrently.

use std::fmt;

use pydeps_core::deps::DependencySet;
use pydeps_core::index::{FindResult, ImportSpec, RuleIndex};
use pydeps_core::label::Label;
use thiserror::Error;
use tracing::{info, trace};

use crate::config::{ResolutionScope, LANGUAGE};
use crate::manifest::ThirdPartyModules;
use crate::modules::{ImportRecord, Imports};
use crate::stdlib::{ClassifierError, StdlibClassifier};

/// `tracing` target for explain diagnostics.
pub const EXPLAIN_TARGET: &str = "pydeps::explain";

// ============================================================================
// Error Types
// ============================================================================

/// One unresolved or ambiguous import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Nothing provides the import and it is not standard library.
    #[error("{}", format_unresolved(.module, .filepath, .lineno))]
    Unresolved {
        module: String,
        filepath: String,
        lineno: u32,
    },

    /// More than one target provides the import.
    #[error(
        "multiple targets ({}) may be imported with {module:?} at line {lineno} in {filepath:?} \
         - this must be fixed using the \"resolve\" directive",
        .candidates.join(", ")
    )]
    Ambiguous {
        module: String,
        filepath: String,
        lineno: u32,
        candidates: Vec<String>,
    },
}

fn format_unresolved(module: &str, filepath: &str, lineno: &u32) -> String {
    format!(
        "{module:?} at line {lineno} from {filepath:?} is an invalid dependency: possible solutions:\n\
         \t1. Add it as a dependency in the requirements.txt file.\n\
         \t2. Resolve it to a known target with the directive 'resolve py {module} <label>'.\n\
         \t3. Ignore it with the directive 'python_ignore_dependencies {module}'.\n"
    )
}

/// Why a target could not be resolved.
#[derive(Debug, Error)]
pub enum TargetFailure {
    /// One or more imports failed; the target must not be written.
    #[error("failed to validate dependencies for target \"{target}\":\n{}", format_errors(.errors))]
    Imports {
        target: Label,
        errors: Vec<ResolutionError>,
    },

    /// The standard-library classifier failed. Fatal for the whole run.
    #[error("failed to classify imports of target \"{target}\": {source}")]
    Classifier {
        target: Label,
        #[source]
        source: ClassifierError,
    },
}

fn format_errors(errors: &[ResolutionError]) -> String {
    errors.iter().map(|e| format!("{}\n", e)).collect()
}

// ============================================================================
// Outcomes
// ============================================================================

/// Which strategy produced a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Override,
    ThirdParty,
    Index,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Override => write!(f, "resolve directive"),
            Strategy::ThirdParty => write!(f, "third-party module"),
            Strategy::Index => write!(f, "first-party indexed labels"),
        }
    }
}

/// Why an import contributes no dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The import resolves back to the importing target.
    SelfImport,
    /// The import is part of the standard library.
    StandardLibrary,
    /// The scope ignores this import.
    Ignored,
    /// Nothing matched and the scope does not validate imports.
    NotValidated,
}

/// Result of resolving one import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Resolved {
        dep: String,
        strategy: Strategy,
        /// The fallback candidate that matched.
        candidate: String,
    },
    Skip(SkipReason),
    Failed(Vec<ResolutionError>),
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves imports against shared, read-only lookup structures.
pub struct Resolver<'a> {
    index: &'a RuleIndex,
    third_party: &'a ThirdPartyModules,
    classifier: &'a dyn StdlibClassifier,
    explain: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        index: &'a RuleIndex,
        third_party: &'a ThirdPartyModules,
        classifier: &'a dyn StdlibClassifier,
    ) -> Self {
        Resolver {
            index,
            third_party,
            classifier,
            explain: None,
        }
    }

    /// Emit an explanation whenever this exact dependency string is produced.
    pub fn with_explain(mut self, dep: Option<String>) -> Self {
        self.explain = dep.filter(|d| !d.is_empty());
        self
    }

    /// Resolve every import of target `from` and merge `pre_resolved`.
    ///
    /// Returns the final dependency set, which never names `from` itself.
    pub fn resolve_target(
        &self,
        from: &Label,
        scope: &ResolutionScope,
        imports: &Imports,
        pre_resolved: &DependencySet,
    ) -> Result<DependencySet, TargetFailure> {
        let mut deps = DependencySet::new();
        let mut errors = Vec::new();

        for record in imports.iter() {
            let outcome = self
                .resolve_import(from, scope, record)
                .map_err(|source| TargetFailure::Classifier {
                    target: from.clone(),
                    source,
                })?;
            match outcome {
                ImportOutcome::Resolved {
                    dep,
                    strategy,
                    candidate,
                } => {
                    self.explain_dependency(from, record, &candidate, strategy, &dep);
                    deps.insert(dep);
                }
                ImportOutcome::Skip(reason) => {
                    trace!(target_label = %from, module = %record.name, ?reason, "import skipped");
                }
                ImportOutcome::Failed(errs) => errors.extend(errs),
            }
        }

        if !errors.is_empty() {
            return Err(TargetFailure::Imports {
                target: from.clone(),
                errors,
            });
        }

        deps.extend(pre_resolved.iter());
        deps.remove_self(from);
        Ok(deps)
    }

    /// Resolve a single import. Only a classifier failure is an `Err`;
    /// unresolved and ambiguous imports come back as [`ImportOutcome::Failed`].
    pub fn resolve_import(
        &self,
        from: &Label,
        scope: &ResolutionScope,
        record: &ImportRecord,
    ) -> Result<ImportOutcome, ClassifierError> {
        if scope.ignores(&record.name) {
            return Ok(ImportOutcome::Skip(SkipReason::Ignored));
        }

        let mut ambiguities = Vec::new();

        for candidate in record.candidates() {
            let spec = ImportSpec::new(LANGUAGE, candidate);

            if let Some(label) = scope.overrides.find(&spec) {
                let mut label = label.clone();
                if label.repo.is_empty() {
                    label.repo = from.repo.clone();
                }
                if label.same_target(from) {
                    return Ok(ImportOutcome::Skip(SkipReason::SelfImport));
                }
                if label.repo == from.repo {
                    label.repo.clear();
                }
                return Ok(resolved(label.to_string(), Strategy::Override, candidate));
            }

            if let Some(dep) = self.third_party.find(candidate) {
                return Ok(resolved(dep, Strategy::ThirdParty, candidate));
            }

            let matches = self.index.find(&spec);
            if matches.is_empty() {
                continue;
            }
            let filtered: Vec<&FindResult> =
                matches.iter().filter(|m| !m.is_self_import(from)).collect();
            if filtered.is_empty() {
                return Ok(ImportOutcome::Skip(SkipReason::SelfImport));
            }

            match pick_match(&filtered, scope) {
                Some(found) => {
                    let dep = found.label.rel(&from.repo, &from.pkg).to_string();
                    return Ok(resolved(dep, Strategy::Index, candidate));
                }
                None => ambiguities.push(ResolutionError::Ambiguous {
                    module: candidate.to_string(),
                    filepath: record.filepath.clone(),
                    lineno: record.lineno,
                    candidates: filtered.iter().map(|m| m.label.to_string()).collect(),
                }),
            }
        }

        if !ambiguities.is_empty() {
            return Ok(ImportOutcome::Failed(ambiguities));
        }

        if self.classifier.is_standard_library(&record.name)? {
            return Ok(ImportOutcome::Skip(SkipReason::StandardLibrary));
        }

        if scope.validate_import_statements {
            return Ok(ImportOutcome::Failed(vec![ResolutionError::Unresolved {
                module: record.name.clone(),
                filepath: record.filepath.clone(),
                lineno: record.lineno,
            }]));
        }
        Ok(ImportOutcome::Skip(SkipReason::NotValidated))
    }

    fn explain_dependency(
        &self,
        from: &Label,
        record: &ImportRecord,
        candidate: &str,
        strategy: Strategy,
        dep: &str,
    ) {
        if self.explain.as_deref() != Some(dep) {
            return;
        }
        info!(
            target: EXPLAIN_TARGET,
            dependency = %dep,
            target_label = %from,
            file = %record.filepath,
            line = record.lineno,
            module = %candidate,
            strategy = %strategy,
            "explaining dependency ({}): in the target \"{}\", the file \"{}\" imports \"{}\" at line {}, which resolves using the {}",
            dep, from, record.filepath, candidate, record.lineno, strategy
        );
    }
}

fn resolved(dep: String, strategy: Strategy, candidate: &str) -> ImportOutcome {
    ImportOutcome::Resolved {
        dep,
        strategy,
        candidate: candidate.to_string(),
    }
}

/// Choose among non-self index matches: a single match wins outright;
/// otherwise exactly one must lie under the scope's project root.
fn pick_match<'r>(matches: &[&'r FindResult], scope: &ResolutionScope) -> Option<&'r FindResult> {
    if let [only] = matches {
        return Some(*only);
    }
    let mut under_root = matches
        .iter()
        .filter(|m| scope.is_under_project_root(&m.label.pkg));
    match (under_root.next(), under_root.next()) {
        (Some(only), None) => Some(*only),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
