//! The third-party manifest and the module map derived from it.
//!
//! The manifest maps importable module names to the pip distribution that
//! provides them, plus the name of the repository the distributions are
//! exposed under:
//!
//! ```json
//! {
//!   "manifest": {
//!     "modules_mapping": { "numpy": "numpy", "yaml": "PyYAML" },
//!     "pip_repository": { "name": "pip" }
//!   },
//!   "integrity": "<sha256 hex>"
//! }
//! ```
//!
//! The manifest is regenerated by `pydeps manifest generate` from a listing
//! of wheel contents; resolution treats it as read-only input.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from loading or generating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// IO error reading or writing a manifest.
    #[error("failed to read manifest at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Malformed manifest JSON.
    #[error("invalid manifest at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The manifest body could not be serialized for hashing.
    #[error("failed to serialize manifest body: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    /// The manifest does not match the requirements it was generated from.
    #[error("manifest integrity mismatch: expected {expected}, computed {actual}; regenerate it with 'pydeps manifest generate'")]
    IntegrityMismatch { expected: String, actual: String },

    /// A wheel listing names no files.
    #[error("wheel listing for '{distribution}' is empty")]
    EmptyWheel { distribution: String },
}

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

// ============================================================================
// Manifest File
// ============================================================================

/// Name of the repository third-party distributions live in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipRepository {
    pub name: String,
}

/// Manifest body (the part covered by the integrity hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestBody {
    /// Module name -> distribution name.
    #[serde(default)]
    pub modules_mapping: BTreeMap<String, String>,
    pub pip_repository: PipRepository,
}

/// The persisted manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub manifest: ManifestBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

impl ManifestFile {
    /// Create a manifest and stamp its integrity from `requirements`.
    pub fn new(body: ManifestBody, requirements: &[u8]) -> ManifestResult<Self> {
        let integrity = compute_integrity(&body, requirements)?;
        Ok(ManifestFile {
            manifest: body,
            integrity: Some(integrity),
        })
    }

    /// Load a manifest from disk.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ManifestError::Json {
            path: display,
            source,
        })
    }

    /// Check the stored integrity against `requirements`.
    ///
    /// A manifest without an integrity field is accepted as-is.
    pub fn verify_integrity(&self, requirements: &[u8]) -> ManifestResult<()> {
        let Some(expected) = &self.integrity else {
            return Ok(());
        };
        let actual = compute_integrity(&self.manifest, requirements)?;
        if *expected != actual {
            return Err(ManifestError::IntegrityMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// sha256 over the requirements bytes followed by the canonical body JSON.
pub fn compute_integrity(body: &ManifestBody, requirements: &[u8]) -> ManifestResult<String> {
    // BTreeMap-backed serialization is key-ordered, so this is canonical.
    let json = serde_json::to_vec(body).map_err(|source| ManifestError::Serialize { source })?;
    let mut hasher = Sha256::new();
    hasher.update(requirements);
    hasher.update(&json);
    Ok(hex::encode(hasher.finalize()))
}

// ============================================================================
// Third-Party Module Map
// ============================================================================

/// Exact-match lookup from module names to external dependency labels.
#[derive(Debug, Clone, Default)]
pub struct ThirdPartyModules {
    repository: String,
    modules: BTreeMap<String, String>,
}

impl ThirdPartyModules {
    pub fn new(repository: impl Into<String>, modules: BTreeMap<String, String>) -> Self {
        ThirdPartyModules {
            repository: repository.into(),
            modules,
        }
    }

    pub fn from_manifest(manifest: &ManifestFile) -> Self {
        ThirdPartyModules::new(
            manifest.manifest.pip_repository.name.clone(),
            manifest.manifest.modules_mapping.clone(),
        )
    }

    /// Dependency label for exactly `module`, if some distribution provides it.
    pub fn find(&self, module: &str) -> Option<String> {
        let distribution = self.modules.get(module)?;
        Some(format!(
            "@{}//{}",
            self.repository,
            normalize_distribution(distribution)
        ))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Normalize a distribution name into a package name: `PyYAML` -> `pyyaml`,
/// `google-cloud.storage` -> `google_cloud_storage`.
pub fn normalize_distribution(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

// ============================================================================
// Manifest Generation
// ============================================================================

/// Module names provided by one wheel, given the paths of its files.
///
/// Metadata directories are skipped. Every `.py` or `.so` file provides its
/// dotted path; `pkg/__init__.py` additionally provides `pkg`.
pub fn modules_from_wheel_files<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut modules = Vec::new();
    for path in paths {
        if is_metadata(path) {
            continue;
        }
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let stem = if path.ends_with(".py") {
            &path[..path.len() - ".py".len()]
        } else if let Some(ext_start) = so_suffix_start(file_name) {
            // Strip every suffix: `_speedups.cpython-311-x86_64-linux-gnu.so`.
            &path[..path.len() - (file_name.len() - ext_start)]
        } else {
            continue;
        };
        if let Some(pkg) = path.strip_suffix("/__init__.py") {
            modules.push(pkg.replace('/', "."));
        }
        modules.push(stem.replace('/', "."));
    }
    modules
}

/// Byte offset of the first `.` in an extension-module file name.
fn so_suffix_start(file_name: &str) -> Option<usize> {
    if !file_name.ends_with(".so") {
        return None;
    }
    file_name.find('.')
}

/// Whether a wheel path lives in a metadata directory.
fn is_metadata(path: &str) -> bool {
    let top_level = path.split('/').next().unwrap_or(path).to_lowercase();
    top_level.ends_with(".dist-info") || top_level.ends_with(".data")
}

/// Build a manifest body from `{distribution: [wheel file paths]}`.
///
/// When two distributions provide the same module the later one (in
/// distribution-name order) wins.
pub fn generate_body(
    wheels: &BTreeMap<String, Vec<String>>,
    pip_repository: &str,
) -> ManifestResult<ManifestBody> {
    let mut modules_mapping = BTreeMap::new();
    for (distribution, files) in wheels {
        if files.is_empty() {
            return Err(ManifestError::EmptyWheel {
                distribution: distribution.clone(),
            });
        }
        for module in modules_from_wheel_files(files.iter().map(String::as_str)) {
            modules_mapping.insert(module, distribution.clone());
        }
    }
    Ok(ManifestBody {
        modules_mapping,
        pip_repository: PipRepository {
            name: pip_repository.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(entries: &[(&str, &str)]) -> ManifestBody {
        ManifestBody {
            modules_mapping: entries
                .iter()
                .map(|(m, d)| (m.to_string(), d.to_string()))
                .collect(),
            pip_repository: PipRepository {
                name: "pip".to_string(),
            },
        }
    }

    mod third_party {
        use super::*;

        #[test]
        fn exact_match_only() {
            let manifest = ManifestFile::new(body(&[("numpy", "numpy")]), b"").unwrap();
            let modules = ThirdPartyModules::from_manifest(&manifest);
            assert_eq!(modules.find("numpy").as_deref(), Some("@pip//numpy"));
            assert_eq!(modules.find("numpy.random"), None);
        }

        #[test]
        fn distribution_names_are_normalized() {
            let modules = ThirdPartyModules::new(
                "pip",
                [("yaml".to_string(), "PyYAML".to_string())].into(),
            );
            assert_eq!(modules.find("yaml").as_deref(), Some("@pip//pyyaml"));
            assert_eq!(normalize_distribution("google-cloud.storage"), "google_cloud_storage");
        }
    }

    mod integrity {
        use super::*;

        #[test]
        fn matches_same_requirements() {
            let manifest = ManifestFile::new(body(&[("six", "six")]), b"six==1.16.0\n").unwrap();
            assert!(manifest.verify_integrity(b"six==1.16.0\n").is_ok());
        }

        #[test]
        fn detects_changed_requirements() {
            let manifest = ManifestFile::new(body(&[("six", "six")]), b"six==1.16.0\n").unwrap();
            let err = manifest.verify_integrity(b"six==1.17.0\n").unwrap_err();
            assert!(matches!(err, ManifestError::IntegrityMismatch { .. }));
        }

        #[test]
        fn hash_covers_requirements_then_body() {
            let body = body(&[("six", "six")]);
            let mut hasher = Sha256::new();
            hasher.update(b"six==1.16.0\n");
            hasher.update(serde_json::to_vec(&body).unwrap());
            let expected = hex::encode(hasher.finalize());
            assert_eq!(compute_integrity(&body, b"six==1.16.0\n").unwrap(), expected);
        }

        #[test]
        fn changed_body_changes_integrity() {
            let a = compute_integrity(&body(&[("six", "six")]), b"").unwrap();
            let b = compute_integrity(&body(&[("six", "six"), ("yaml", "PyYAML")]), b"").unwrap();
            assert_ne!(a, b);
        }

        #[test]
        fn missing_integrity_is_accepted() {
            let manifest = ManifestFile {
                manifest: body(&[]),
                integrity: None,
            };
            assert!(manifest.verify_integrity(b"anything").is_ok());
        }
    }

    mod generation {
        use super::*;

        #[test]
        fn wheel_files_to_modules() {
            let modules = modules_from_wheel_files([
                "requests/__init__.py",
                "requests/adapters.py",
                "requests-2.31.0.dist-info/METADATA",
                "requests-2.31.0.data/scripts/tool.py",
                "requests/py.typed",
            ]);
            assert_eq!(
                modules,
                vec!["requests", "requests.__init__", "requests.adapters"]
            );
        }

        #[test]
        fn extension_modules_drop_all_suffixes() {
            let modules =
                modules_from_wheel_files(["markupsafe/_speedups.cpython-311-x86_64-linux-gnu.so"]);
            assert_eq!(modules, vec!["markupsafe._speedups"]);
        }

        #[test]
        fn generate_body_collects_every_wheel() {
            let wheels: BTreeMap<String, Vec<String>> = [
                ("PyYAML".to_string(), vec!["yaml/__init__.py".to_string()]),
                ("six".to_string(), vec!["six.py".to_string()]),
            ]
            .into();
            let body = generate_body(&wheels, "pip").unwrap();
            assert_eq!(body.modules_mapping.get("yaml").unwrap(), "PyYAML");
            assert_eq!(body.modules_mapping.get("six").unwrap(), "six");
        }

        #[test]
        fn empty_wheel_is_an_error() {
            let wheels: BTreeMap<String, Vec<String>> = [("broken".to_string(), vec![])].into();
            assert!(matches!(
                generate_body(&wheels, "pip"),
                Err(ManifestError::EmptyWheel { .. })
            ));
        }
    }

    #[test]
    fn load_reads_json_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = ManifestFile::new(body(&[("six", "six")]), b"").unwrap();
        std::fs::write(&path, serde_json::to_string(&manifest).unwrap()).unwrap();
        assert_eq!(ManifestFile::load(&path).unwrap(), manifest);
    }
}
