//! Import index: which targets provide which import strings.
//!
//! The index is populated once, from every generated rule's provided imports,
//! before any resolution pass begins. After [`RuleIndex::finish`] it is
//! read-only and can be shared across threads by reference.
//!
//! Several targets may register the same import string (re-exported
//! packages, vendored copies under independent project roots). The index
//! reports all of them; choosing among them is the resolver's job.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::label::Label;

/// Lookup key into the index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImportSpec {
    /// Language identifier (e.g., `py`).
    pub lang: String,
    /// Dotted import string.
    #[serde(rename = "imp")]
    pub import: String,
}

impl ImportSpec {
    pub fn new(lang: impl Into<String>, import: impl Into<String>) -> Self {
        ImportSpec {
            lang: lang.into(),
            import: import.into(),
        }
    }
}

/// One index hit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FindResult {
    /// Absolute label of the providing target.
    pub label: Label,
}

impl FindResult {
    /// Whether this result is the importing target itself.
    pub fn is_self_import(&self, from: &Label) -> bool {
        self.label.same_target(from)
    }
}

/// Registry of `(lang, import) -> providing targets`.
#[derive(Debug, Default)]
pub struct RuleIndex {
    by_import: BTreeMap<ImportSpec, BTreeSet<Label>>,
    finished: BTreeMap<ImportSpec, Vec<FindResult>>,
}

impl RuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `label` as a provider of every spec in `provides`.
    pub fn add_rule(&mut self, label: &Label, provides: impl IntoIterator<Item = ImportSpec>) {
        for spec in provides {
            self.by_import
                .entry(spec)
                .or_default()
                .insert(label.clone());
        }
    }

    /// Freeze the index. Results are sorted by label so lookups are
    /// deterministic regardless of registration order.
    pub fn finish(&mut self) {
        self.finished = std::mem::take(&mut self.by_import)
            .into_iter()
            .map(|(spec, labels)| {
                let results = labels.into_iter().map(|label| FindResult { label }).collect();
                (spec, results)
            })
            .collect();
    }

    /// All targets providing `spec`. Empty when nothing matches.
    pub fn find(&self, spec: &ImportSpec) -> &[FindResult] {
        self.finished.get(spec).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct import specs in the finished index.
    pub fn len(&self) -> usize {
        self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finished.is_empty()
    }
}
