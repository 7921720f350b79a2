//! Dependency sets and the `deps` attribute they serialize to.
//!
//! A [`DependencySet`] is owned by exactly one resolution pass. It is sorted
//! and duplicate-free by construction, so the rendered attribute does not
//! depend on the order imports were discovered in.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::label::Label;

/// Sorted, duplicate-free dependency label strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySet(BTreeSet<String>);

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency. Returns `false` if it was already present.
    pub fn insert(&mut self, dep: impl Into<String>) -> bool {
        self.0.insert(dep.into())
    }

    /// Merge another set into this one.
    pub fn extend<I, S>(&mut self, deps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(deps.into_iter().map(Into::into));
    }

    pub fn contains(&self, dep: &str) -> bool {
        self.0.contains(dep)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Drop every entry naming `owner`, in any of its spellings.
    ///
    /// Entries that do not parse as labels are kept as-is.
    pub fn remove_self(&mut self, owner: &Label) {
        self.0.retain(|dep| match Label::parse(dep) {
            Ok(label) => !label.abs(&owner.repo, &owner.pkg).same_target(owner),
            Err(_) => true,
        });
    }

    /// Convert into the persisted attribute form.
    pub fn into_attr(self) -> DepsAttr {
        if self.0.is_empty() {
            DepsAttr::Absent
        } else {
            DepsAttr::List(self.0.into_iter().collect())
        }
    }
}

impl<S: Into<String>> FromIterator<S> for DependencySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = DependencySet::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for DependencySet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================================
// Output Assembler
// ============================================================================

/// The `deps` attribute of a target, as persisted.
///
/// An empty set means the attribute is omitted entirely, never written as
/// `deps = []`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepsAttr {
    /// No `deps` attribute.
    Absent,
    /// Sorted label strings.
    List(Vec<String>),
}

impl DepsAttr {
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            DepsAttr::Absent => None,
            DepsAttr::List(deps) => Some(deps),
        }
    }

    /// Render as a Starlark attribute assignment, or `None` when absent.
    ///
    /// A single dependency stays on one line; longer lists put one entry
    /// per line with a trailing comma, matching buildifier's layout.
    pub fn render(&self, indent: &str) -> Option<String> {
        let deps = self.as_list()?;
        let mut out = String::new();
        if let [only] = deps {
            let _ = write!(out, "{indent}deps = [{}],", quote(only));
            return Some(out);
        }
        let _ = writeln!(out, "{indent}deps = [");
        for dep in deps {
            let _ = writeln!(out, "{indent}    {},", quote(dep));
        }
        let _ = write!(out, "{indent}],");
        Some(out)
    }
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_sorted_and_deduplicated() {
        let set: DependencySet = ["//b:lib", "@pip//numpy", "//a:lib", "//b:lib"]
            .into_iter()
            .collect();
        let deps: Vec<&str> = set.iter().collect();
        assert_eq!(deps, vec!["//a:lib", "//b:lib", "@pip//numpy"]);
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut set = DependencySet::new();
        assert!(set.insert(":util"));
        assert!(!set.insert(":util"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_self_matches_every_spelling() {
        let owner = Label::new("", "a", "lib");
        let mut set: DependencySet = [":lib", "//a:lib", "//a:other", "@pip//six", "not a label"]
            .into_iter()
            .collect();
        set.remove_self(&owner);
        let deps: Vec<&str> = set.iter().collect();
        assert_eq!(deps, vec!["//a:other", "@pip//six", "not a label"]);
    }

    #[test]
    fn remove_self_keeps_same_named_external_targets() {
        let owner = Label::new("", "numpy", "numpy");
        let mut set: DependencySet = ["@pip//numpy", "//numpy"].into_iter().collect();
        set.remove_self(&owner);
        let deps: Vec<&str> = set.iter().collect();
        assert_eq!(deps, vec!["@pip//numpy"]);
    }

    mod attr {
        use super::*;

        #[test]
        fn empty_set_is_absent() {
            let attr = DependencySet::new().into_attr();
            assert_eq!(attr, DepsAttr::Absent);
            assert_eq!(attr.render(""), None);
        }

        #[test]
        fn single_entry_renders_inline() {
            let attr: DepsAttr = [":util"].into_iter().collect::<DependencySet>().into_attr();
            assert_eq!(attr.render("    ").unwrap(), "    deps = [\":util\"],");
        }

        #[test]
        fn multiple_entries_render_one_per_line() {
            let attr = ["@pip//numpy", ":util"]
                .into_iter()
                .collect::<DependencySet>()
                .into_attr();
            assert_eq!(
                attr.render("").unwrap(),
                "deps = [\n    \":util\",\n    \"@pip//numpy\",\n],"
            );
        }
    }
}
