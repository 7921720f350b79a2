//! Import specs provided by generated Python rules.
//!
//! A rule is indexed under one import spec per `.py` source, computed
//! relative to the project root of the package declaring it. For a rule in
//! package `a/b` with project root `a`:
//!
//! - `util.py` provides `b.util`
//! - `__init__.py` provides `b`
//! - `sub/mod.py` provides `b.sub.mod`

use pydeps_core::index::ImportSpec;

use crate::config::LANGUAGE;

/// File that turns a directory into an importable package.
pub const PACKAGE_ENTRYPOINT: &str = "__init__.py";

/// Import spec for one source file of a rule in package `pkg`.
///
/// Returns `None` for non-Python sources and for an `__init__.py` sitting
/// directly at the project root (it has no importable name).
pub fn import_spec_from_src(project_root: &str, pkg: &str, src: &str) -> Option<ImportSpec> {
    let module_file = src.strip_suffix(".py")?;
    let (src_dir, file_name) = match src.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", src),
    };

    let package_dir = join_path(pkg, src_dir);
    let rel_dir = relative_to(&package_dir, project_root);
    let python_pkg = rel_dir.replace('/', ".");

    if file_name == PACKAGE_ENTRYPOINT {
        if python_pkg.is_empty() {
            return None;
        }
        return Some(ImportSpec::new(LANGUAGE, python_pkg));
    }

    let module = module_file.rsplit('/').next().unwrap_or(module_file);
    let import = if python_pkg.is_empty() {
        module.to_string()
    } else {
        format!("{}.{}", python_pkg, module)
    };
    Some(ImportSpec::new(LANGUAGE, import))
}

/// All import specs provided by a rule's sources, or `None` when the rule
/// has no Python sources and must not be indexed.
pub fn provided_imports(project_root: &str, pkg: &str, srcs: &[String]) -> Option<Vec<ImportSpec>> {
    let has_python = srcs.iter().any(|src| src.ends_with(".py"));
    if !has_python {
        return None;
    }
    Some(
        srcs.iter()
            .filter_map(|src| import_spec_from_src(project_root, pkg, src))
            .collect(),
    )
}

fn join_path(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{}/{}", a, b),
    }
}

/// `path` relative to `root`. Paths outside `root` are returned unchanged.
fn relative_to<'a>(path: &'a str, root: &str) -> &'a str {
    if root.is_empty() {
        return path;
    }
    if path == root {
        return "";
    }
    path.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}
