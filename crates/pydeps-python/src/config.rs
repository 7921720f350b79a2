//! Per-package resolution configuration.
//!
//! Configuration is expressed as directives attached to packages. A package
//! inherits everything from its nearest configured ancestor and then applies
//! its own directives on top:
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `resolve <lang> <import> <label>` | Override Table entry |
//! | `python_root` | This package is the project root |
//! | `python_validate_import_statements true\|false` | Strictness |
//! | `python_ignore_dependencies a,b` | Ignored import names (additive) |
//!
//! Directives for other languages or other extensions are ignored.

use std::collections::{BTreeMap, BTreeSet};

use pydeps_core::index::ImportSpec;
use pydeps_core::label::{Label, LabelError};
use thiserror::Error;
use tracing::debug;

/// Language identifier used in import specs and `resolve` directives.
pub const LANGUAGE: &str = "py";

/// Prefix that directives carry when written as build-file comments.
const DIRECTIVE_COMMENT_PREFIX: &str = "# gazelle:";

// ============================================================================
// Error Types
// ============================================================================

/// Errors from parsing directives.
#[derive(Debug, Error)]
pub enum DirectiveError {
    /// `resolve` with the wrong number of arguments.
    #[error("directive '{directive}' in package '{pkg}': expected 'resolve <lang> <import> <label>'")]
    MalformedResolve { pkg: String, directive: String },

    /// Override label does not parse.
    #[error("directive '{directive}' in package '{pkg}': {source}")]
    InvalidLabel {
        pkg: String,
        directive: String,
        #[source]
        source: LabelError,
    },

    /// Boolean directive with a non-boolean value.
    #[error("directive '{directive}' in package '{pkg}': expected 'true' or 'false'")]
    InvalidBool { pkg: String, directive: String },
}

/// Result type for directive parsing.
pub type DirectiveResult<T> = Result<T, DirectiveError>;

// ============================================================================
// Directives
// ============================================================================

/// One recognized directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Resolve { spec: ImportSpec, label: Label },
    PythonRoot,
    ValidateImportStatements(bool),
    IgnoreDependencies(Vec<String>),
}

impl Directive {
    /// Parse one directive line. Returns `Ok(None)` for keys this
    /// resolver does not own.
    pub fn parse(pkg: &str, line: &str) -> DirectiveResult<Option<Directive>> {
        let line = line.trim();
        let line = line.strip_prefix(DIRECTIVE_COMMENT_PREFIX).unwrap_or(line);
        let mut words = line.split_whitespace();
        let Some(key) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let directive = match key {
            "resolve" => {
                let [lang, import, label] = args.as_slice() else {
                    return Err(DirectiveError::MalformedResolve {
                        pkg: pkg.to_string(),
                        directive: line.to_string(),
                    });
                };
                let label = Label::parse(label).map_err(|source| DirectiveError::InvalidLabel {
                    pkg: pkg.to_string(),
                    directive: line.to_string(),
                    source,
                })?;
                // Relative override labels point into the declaring package.
                let label = label.abs("", pkg);
                Directive::Resolve {
                    spec: ImportSpec::new(*lang, *import),
                    label,
                }
            }
            "python_root" => Directive::PythonRoot,
            "python_validate_import_statements" => {
                let value = match args.first().copied() {
                    Some("true") | None => true,
                    Some("false") => false,
                    Some(_) => {
                        return Err(DirectiveError::InvalidBool {
                            pkg: pkg.to_string(),
                            directive: line.to_string(),
                        })
                    }
                };
                Directive::ValidateImportStatements(value)
            }
            "python_ignore_dependencies" => Directive::IgnoreDependencies(
                args.iter()
                    .flat_map(|arg| arg.split(','))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            other => {
                debug!("ignoring directive '{}' in package '{}'", other, pkg);
                return Ok(None);
            }
        };
        Ok(Some(directive))
    }
}

// ============================================================================
// Override Table
// ============================================================================

/// Exact-match forced resolutions, `(lang, import) -> label`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    entries: BTreeMap<ImportSpec, Label>,
}

impl OverrideTable {
    /// Install an entry; a later entry for the same spec replaces the earlier one.
    pub fn insert(&mut self, spec: ImportSpec, label: Label) {
        self.entries.insert(spec, label);
    }

    /// Exact lookup. No prefix search happens here.
    pub fn find(&self, spec: &ImportSpec) -> Option<&Label> {
        self.entries.get(spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Resolution Scope
// ============================================================================

/// Effective configuration for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionScope {
    /// Package path of the Python project root (`""` for the workspace root).
    pub project_root: String,
    /// Whether unresolved imports are errors.
    pub validate_import_statements: bool,
    /// Import names that never produce a dependency.
    pub ignored: BTreeSet<String>,
    /// Forced resolutions in effect for this package.
    pub overrides: OverrideTable,
}

impl Default for ResolutionScope {
    fn default() -> Self {
        ResolutionScope {
            project_root: String::new(),
            validate_import_statements: true,
            ignored: BTreeSet::new(),
            overrides: OverrideTable::default(),
        }
    }
}

impl ResolutionScope {
    fn apply(&mut self, pkg: &str, directive: Directive) {
        match directive {
            Directive::Resolve { spec, label } => self.overrides.insert(spec, label),
            Directive::PythonRoot => self.project_root = pkg.to_string(),
            Directive::ValidateImportStatements(value) => self.validate_import_statements = value,
            Directive::IgnoreDependencies(names) => self.ignored.extend(names),
        }
    }

    /// Whether `import` is explicitly ignored.
    pub fn ignores(&self, import: &str) -> bool {
        self.ignored.contains(import)
    }

    /// Whether package `pkg` lies under this scope's project root.
    pub fn is_under_project_root(&self, pkg: &str) -> bool {
        is_within(pkg, &self.project_root)
    }
}

/// Whether `pkg` equals `root` or is nested below it.
fn is_within(pkg: &str, root: &str) -> bool {
    root.is_empty()
        || pkg == root
        || pkg
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Ancestors of a package, nearest first, ending with the root package `""`.
fn ancestors(pkg: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(pkg);
    std::iter::from_fn(move || {
        let current = next?;
        next = if current.is_empty() {
            None
        } else {
            Some(current.rfind('/').map_or("", |idx| &current[..idx]))
        };
        Some(current)
    })
}

// ============================================================================
// Configs
// ============================================================================

/// Effective scopes for every configured package.
#[derive(Debug, Clone)]
pub struct Configs {
    scopes: BTreeMap<String, ResolutionScope>,
}

impl Default for Configs {
    fn default() -> Self {
        let mut scopes = BTreeMap::new();
        scopes.insert(String::new(), ResolutionScope::default());
        Configs { scopes }
    }
}

impl Configs {
    /// Build scopes from directives keyed by package path.
    pub fn from_directives(directives: &BTreeMap<String, Vec<String>>) -> DirectiveResult<Self> {
        let mut configs = Configs::default();
        // Sorted order visits every parent before its children.
        for (pkg, lines) in directives {
            let mut scope = configs.scope_for(pkg).clone();
            for line in lines {
                if let Some(directive) = Directive::parse(pkg, line)? {
                    scope.apply(pkg, directive);
                }
            }
            configs.scopes.insert(pkg.clone(), scope);
        }
        Ok(configs)
    }

    /// Effective scope for `pkg`: its own, or its nearest configured ancestor's.
    pub fn scope_for(&self, pkg: &str) -> &ResolutionScope {
        ancestors(pkg)
            .find_map(|candidate| self.scopes.get(candidate))
            .unwrap_or(&DEFAULT_SCOPE)
    }
}

static DEFAULT_SCOPE: std::sync::LazyLock<ResolutionScope> =
    std::sync::LazyLock::new(ResolutionScope::default);

// ============================================================================
// Tests
// ============================================================================
