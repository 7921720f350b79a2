//! Build target labels.
//!
//! A label names one build target: `@repo//pkg/path:name`. The repository is
//! empty for the current repository. Labels produced by resolution are
//! usually relativized against the importing target so that the persisted
//! `deps` list reads `:sibling` or `//other/pkg:lib` rather than a fully
//! qualified form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from parsing a label string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// The input was empty.
    #[error("empty label")]
    Empty,

    /// The repository component is malformed (e.g., `@//pkg` with a stray `@`).
    #[error("invalid repository in label '{label}'")]
    InvalidRepository { label: String },

    /// The target name is empty or contains a forbidden character.
    #[error("invalid target name in label '{label}'")]
    InvalidName { label: String },

    /// The package path is malformed.
    #[error("invalid package in label '{label}': {reason}")]
    InvalidPackage { label: String, reason: String },
}

// ============================================================================
// Label
// ============================================================================

/// Identity of one build target.
///
/// `relative` labels (`:name`) carry neither repository nor package; they
/// only make sense next to the target they were relativized against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Label {
    /// Repository name without the leading `@`. Empty means the current one.
    pub repo: String,
    /// Package path, `/`-separated, no leading `//`.
    pub pkg: String,
    /// Target name.
    pub name: String,
    /// Whether this is a package-relative label (`:name`).
    pub relative: bool,
}

impl Label {
    /// Create an absolute label.
    pub fn new(repo: impl Into<String>, pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Label {
            repo: repo.into(),
            pkg: pkg.into(),
            name: name.into(),
            relative: false,
        }
    }

    /// Parse a label string.
    pub fn parse(s: &str) -> Result<Self, LabelError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LabelError::Empty);
        }

        // `:name` or bare `name`
        if let Some(name) = s.strip_prefix(':') {
            validate_name(name, s)?;
            return Ok(Label {
                name: name.to_string(),
                relative: true,
                ..Label::default()
            });
        }

        let (repo, rest) = if let Some(after_at) = s.strip_prefix('@') {
            // Tolerate bzlmod canonical `@@repo` spellings.
            let after_at = after_at.trim_start_matches('@');
            match after_at.find("//") {
                Some(idx) => (&after_at[..idx], &after_at[idx..]),
                None => {
                    // `@repo` is shorthand for `@repo//:repo`.
                    if after_at.is_empty() || after_at.contains(':') || after_at.contains('/') {
                        return Err(LabelError::InvalidRepository {
                            label: s.to_string(),
                        });
                    }
                    return Ok(Label::new(after_at, "", after_at));
                }
            }
        } else {
            ("", s)
        };

        let Some(rest) = rest.strip_prefix("//") else {
            if rest.contains('/') || rest.contains(':') {
                return Err(LabelError::InvalidPackage {
                    label: s.to_string(),
                    reason: "absolute labels must start with '//'".to_string(),
                });
            }
            validate_name(rest, s)?;
            return Ok(Label {
                name: rest.to_string(),
                relative: true,
                ..Label::default()
            });
        };

        let (pkg, name) = match rest.split_once(':') {
            Some((pkg, name)) => (pkg, name.to_string()),
            None => {
                // `//foo/bar` is shorthand for `//foo/bar:bar`.
                let base = rest.rsplit('/').next().unwrap_or(rest);
                (rest, base.to_string())
            }
        };

        if pkg.starts_with('/') || pkg.ends_with('/') || pkg.contains("//") {
            return Err(LabelError::InvalidPackage {
                label: s.to_string(),
                reason: "package path has empty components".to_string(),
            });
        }
        validate_name(&name, s)?;

        Ok(Label::new(repo, pkg, name))
    }

    /// Relativize this label against the scope `(repo, pkg)`.
    ///
    /// Same repository and package yields `:name`; same repository yields
    /// `//pkg:name`; anything else is returned unchanged.
    pub fn rel(&self, repo: &str, pkg: &str) -> Label {
        if self.relative || self.repo != repo {
            return self.clone();
        }
        if self.pkg == pkg {
            return Label {
                name: self.name.clone(),
                relative: true,
                ..Label::default()
            };
        }
        Label::new("", self.pkg.clone(), self.name.clone())
    }

    /// Resolve a relative label against the package it appears in.
    pub fn abs(&self, repo: &str, pkg: &str) -> Label {
        if !self.relative {
            return self.clone();
        }
        Label::new(repo, pkg, self.name.clone())
    }

    /// Whether two labels name the same target.
    ///
    /// Repositories compare exactly: callers fill in the current repository
    /// (see [`Label::abs`]) before asking.
    pub fn same_target(&self, other: &Label) -> bool {
        self.repo == other.repo
            && self.pkg == other.pkg
            && self.name == other.name
            && self.relative == other.relative
    }
}

fn validate_name(name: &str, label: &str) -> Result<(), LabelError> {
    if name.is_empty() || name.contains(':') || name.starts_with('/') || name.ends_with('/') {
        return Err(LabelError::InvalidName {
            label: label.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            return write!(f, ":{}", self.name);
        }
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
            if self.pkg.is_empty() && self.name == self.repo {
                return Ok(());
            }
        }
        let base = self.pkg.rsplit('/').next().unwrap_or("");
        if !self.pkg.is_empty() && base == self.name {
            write!(f, "//{}", self.pkg)
        } else {
            write!(f, "//{}:{}", self.pkg, self.name)
        }
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::parse(s)
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Label::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod parse {
        use super::*;

        #[test]
        fn full_label() {
            let label = Label::parse("@pip//numpy:pkg").unwrap();
            assert_eq!(label.repo, "pip");
            assert_eq!(label.pkg, "numpy");
            assert_eq!(label.name, "pkg");
            assert!(!label.relative);
        }

        #[test]
        fn package_shorthand() {
            let label = Label::parse("//foo/bar").unwrap();
            assert_eq!(label.pkg, "foo/bar");
            assert_eq!(label.name, "bar");
        }

        #[test]
        fn relative_label() {
            let label = Label::parse(":lib").unwrap();
            assert!(label.relative);
            assert_eq!(label.name, "lib");
        }

        #[test]
        fn repository_shorthand() {
            let label = Label::parse("@six").unwrap();
            assert_eq!(label, Label::new("six", "", "six"));
            assert_eq!(label.to_string(), "@six");
        }

        #[test]
        fn root_package() {
            let label = Label::parse("//:lib").unwrap();
            assert_eq!(label.pkg, "");
            assert_eq!(label.name, "lib");
            assert_eq!(label.to_string(), "//:lib");
        }

        #[test]
        fn rejects_garbage() {
            assert_eq!(Label::parse(""), Err(LabelError::Empty));
            assert!(Label::parse("//a:").is_err());
            assert!(Label::parse("//a//b:c").is_err());
            assert!(Label::parse("a/b:c").is_err());
        }
    }

    mod display {
        use super::*;

        #[test]
        fn shortens_matching_name() {
            assert_eq!(Label::new("", "a/lib", "lib").to_string(), "//a/lib");
            assert_eq!(Label::new("", "a", "lib").to_string(), "//a:lib");
            assert_eq!(Label::new("pip", "numpy", "numpy").to_string(), "@pip//numpy");
        }

        #[test]
        fn round_trips_common_forms() {
            for s in ["//a:lib", "@pip//numpy", ":x", "//a/b", "@r//p:n"] {
                assert_eq!(Label::parse(s).unwrap().to_string(), s);
            }
        }
    }

    mod relativize {
        use super::*;

        #[test]
        fn same_package_becomes_relative() {
            let label = Label::new("", "a", "lib");
            assert_eq!(label.rel("", "a").to_string(), ":lib");
        }

        #[test]
        fn same_repo_drops_repo() {
            let label = Label::new("", "b", "lib");
            assert_eq!(label.rel("", "a").to_string(), "//b:lib");
        }

        #[test]
        fn other_repo_is_unchanged() {
            let label = Label::new("other", "b", "lib");
            assert_eq!(label.rel("", "b").to_string(), "@other//b:lib");
        }

        #[test]
        fn abs_fills_in_scope() {
            let label = Label::parse(":lib").unwrap();
            assert_eq!(label.abs("", "a/b"), Label::new("", "a/b", "lib"));
        }
    }

    #[test]
    fn same_target_compares_repositories_exactly() {
        let local = Label::new("", "a", "lib");
        assert!(local.same_target(&Label::new("", "a", "lib")));
        assert!(!local.same_target(&Label::new("vendor", "a", "lib")));
        assert!(!Label::new("vendor", "a", "lib").same_target(&local));
        assert!(!local.same_target(&Label::new("", "a", "other")));
    }

    #[test]
    fn serde_uses_string_form() {
        let label = Label::new("", "a", "lib");
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, "\"//a:lib\"");
        let back: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(back, label);
    }
}
