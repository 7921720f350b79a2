//! Import records produced by the source parser.
//!
//! The parser emits one record per imported name:
//! `import a.b` yields `a.b`, and `from a.b import c` yields `a.b.c`
//! (the resolver's fallback search decides whether `c` is a module or an
//! attribute). Relative imports never reach this layer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One import statement found in one source file.
///
/// Records order by module name first, so a target's imports are always
/// resolved in the same order regardless of file discovery order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Dotted module name as imported.
    pub name: String,
    /// Source file (workspace-relative) containing the import.
    pub filepath: String,
    /// 1-based line of the import statement.
    pub lineno: u32,
}

impl ImportRecord {
    pub fn new(name: impl Into<String>, filepath: impl Into<String>, lineno: u32) -> Self {
        ImportRecord {
            name: name.into(),
            filepath: filepath.into(),
            lineno,
        }
    }

    /// The fallback sequence for this import: the full name, then each
    /// shorter dotted prefix down to the top-level package.
    ///
    /// `foo.bar.baz` yields `["foo.bar.baz", "foo.bar", "foo"]`.
    pub fn candidates(&self) -> Vec<&str> {
        let mut candidates = vec![self.name.as_str()];
        let mut rest = self.name.as_str();
        while let Some(idx) = rest.rfind('.') {
            rest = &rest[..idx];
            candidates.push(rest);
        }
        candidates
    }
}

/// What the generator hands the resolver for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Imports {
    /// The target has no import payload; resolution is skipped and only
    /// pre-resolved dependencies are kept.
    #[default]
    NoImports,
    /// Sorted, de-duplicated import records.
    ImportList(BTreeSet<ImportRecord>),
}

impl Imports {
    pub fn from_records(records: impl IntoIterator<Item = ImportRecord>) -> Self {
        Imports::ImportList(records.into_iter().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportRecord> {
        let set = match self {
            Imports::NoImports => None,
            Imports::ImportList(set) => Some(set),
        };
        set.into_iter().flatten()
    }
}

impl From<Option<Vec<ImportRecord>>> for Imports {
    fn from(records: Option<Vec<ImportRecord>>) -> Self {
        match records {
            None => Imports::NoImports,
            Some(records) => Imports::from_records(records),
        }
    }
}
