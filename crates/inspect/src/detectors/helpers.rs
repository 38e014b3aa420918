//! Shared detector helpers.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::InspectError;

/// Non-recursive glob over one directory, sorted by name.
pub(crate) fn glob_files(base: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, InspectError> {
    let mut found = Vec::new();
    let entries = fs::read_dir(base).map_err(|e| InspectError::file(base, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| InspectError::file(base, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|ext| ext.to_string_lossy())
            .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)));
        if matches {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Picks an entrypoint: the hint when it has the right extension, then
/// the first conventional name that exists, then the only file of that
/// extension if exactly one exists.
pub(crate) fn find_entrypoint(
    base: &Path,
    hint: Option<&str>,
    extension: &str,
    conventional: &[&str],
) -> Result<Option<String>, InspectError> {
    if let Some(hint) = hint {
        if hint.ends_with(&format!(".{extension}")) && base.join(hint).is_file() {
            return Ok(Some(hint.to_string()));
        }
    }
    for name in conventional {
        if base.join(name).is_file() {
            return Ok(Some((*name).to_string()));
        }
    }
    let candidates = glob_files(base, &[extension])?;
    if candidates.len() == 1 {
        if let Some(name) = candidates[0].file_name() {
            return Ok(Some(name.to_string_lossy().into_owned()));
        }
    }
    Ok(None)
}

/// Scans raw file text for import statements naming any of `packages`.
///
/// This is a substring-level check, not a parser: a matching line inside a
/// docstring or comment counts. Package names match as prefixes, so
/// `flask` also hits `flask_api`.
pub(crate) fn has_python_imports(content: &str, packages: &[&str]) -> bool {
    packages.iter().any(|pkg| {
        let escaped = regex::escape(pkg);
        let pattern = format!(r"(?m)^\s*(?:import\s+{escaped}|from\s+{escaped})");
        Regex::new(&pattern)
            .map(|re| re.is_match(content))
            .unwrap_or(false)
    })
}

pub(crate) fn file_has_python_imports(
    path: &Path,
    packages: &[&str],
) -> Result<bool, InspectError> {
    let bytes = fs::read(path).map_err(|e| InspectError::file(path, e))?;
    Ok(has_python_imports(
        &String::from_utf8_lossy(&bytes),
        packages,
    ))
}

/// Relative POSIX path of `path` under `base`.
pub(crate) fn rel_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
