//! Directory tree walk with ignore rules and symlink handling.
//!
//! Symbolic links are resolved before deciding how to treat an entry: a
//! link to a file is visited as a file at the link's path; a link to a
//! directory has the *target's* children listed but reported under the
//! link's path, so the link appears as a real subtree to the manifest,
//! the archive, and the ignore rules.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::matcher::PatternSet;
use crate::BundleError;

/// Ignore files discovered during the walk contribute their patterns,
/// scoped to the directory that contains them.
pub const IGNORE_FILENAME: &str = ".podiumignore";

/// Visitor for walked entries. `rel_path` is POSIX-style and relative to
/// the walked root; `metadata` is the link target's metadata for symlinks.
pub(crate) type VisitFn<'a> =
    dyn FnMut(&str, &Path, &fs::Metadata) -> Result<(), BundleError> + 'a;

/// Walks `base`, applying and extending `patterns` as ignore files are
/// discovered. The root directory itself is not visited.
pub(crate) fn walk_tree(
    base: &Path,
    patterns: &mut PatternSet,
    visit: &mut VisitFn<'_>,
) -> Result<(), BundleError> {
    walk_children(base, base, "", patterns, visit)
}

/// Visits the children of one directory. `list_dir` is where entries are
/// actually read from; `report_dir` is where they are reported to exist.
/// The two differ only below a directory symlink.
fn walk_children(
    list_dir: &Path,
    report_dir: &Path,
    rel_prefix: &str,
    patterns: &mut PatternSet,
    visit: &mut VisitFn<'_>,
) -> Result<(), BundleError> {
    let ignore_file = list_dir.join(IGNORE_FILENAME);
    if ignore_file.is_file() {
        debug!(path = %ignore_file.display(), "loading ignore file");
        patterns.add_from_file(&ignore_file, rel_prefix)?;
    }

    let mut names: Vec<_> = fs::read_dir(list_dir)
        .map_err(|e| BundleError::file(list_dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BundleError::file(list_dir, e))?
        .into_iter()
        .map(|entry| entry.file_name())
        .collect();
    names.sort();

    for name in names {
        let path = report_dir.join(&name);
        let rel = join_rel(rel_prefix, &name.to_string_lossy());
        let meta = fs::symlink_metadata(&path).map_err(|e| BundleError::file(&path, e))?;

        if meta.file_type().is_symlink() {
            walk_symlink(&path, &rel, patterns, visit)?;
        } else if meta.is_dir() {
            if patterns.excluded(&rel) {
                debug!(path = rel, "skipping ignored directory");
                continue;
            }
            visit(&rel, &path, &meta)?;
            walk_children(&path, &path, &rel, patterns, visit)?;
        } else if meta.is_file() {
            if patterns.excluded(&rel) {
                debug!(path = rel, "skipping ignored file");
                continue;
            }
            visit(&rel, &path, &meta)?;
        } else {
            warn!(path = rel, "skipping non-regular file");
        }
    }
    Ok(())
}

fn walk_symlink(
    path: &Path,
    rel: &str,
    patterns: &mut PatternSet,
    visit: &mut VisitFn<'_>,
) -> Result<(), BundleError> {
    if patterns.excluded(rel) {
        debug!(path = rel, "skipping ignored symlink");
        return Ok(());
    }
    debug!(path = rel, "following symlink");
    let target = fs::canonicalize(path).map_err(|e| BundleError::file(path, e))?;
    let target_meta = fs::metadata(&target).map_err(|e| BundleError::file(&target, e))?;
    if target_meta.is_dir() {
        visit(rel, path, &target_meta)?;
        // List the resolved target, report under the link path.
        walk_children(&target, path, rel, patterns, visit)
    } else {
        visit(rel, path, &target_meta)
    }
}

fn join_rel(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn collect(base: &Path, patterns: &mut PatternSet) -> Vec<(String, bool)> {
        let mut seen = Vec::new();
        walk_tree(base, patterns, &mut |rel, _path, meta| {
            seen.push((rel.to_string(), meta.is_dir()));
            Ok(())
        })
        .unwrap();
        seen
    }

    #[test]
    fn walk_is_sorted_and_relative() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.txt"), b"c").unwrap();

        let mut patterns = PatternSet::new();
        let seen = collect(dir.path(), &mut patterns);
        assert_eq!(
            seen,
            vec![
                ("a.txt".to_string(), false),
                ("b.txt".to_string(), false),
                ("sub".to_string(), true),
                ("sub/c.txt".to_string(), false),
            ]
        );
    }

    #[test]
    fn ignored_directory_is_not_descended() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("skipme")).unwrap();
        fs::write(dir.path().join("skipme").join("x"), b"x").unwrap();
        fs::write(dir.path().join("keep.txt"), b"k").unwrap();

        let mut patterns = PatternSet::new();
        patterns.add("skipme/", crate::MatchSource::Caller).unwrap();
        let seen = collect(dir.path(), &mut patterns);
        assert_eq!(seen, vec![("keep.txt".to_string(), false)]);
    }

    #[test]
    fn ignore_file_discovered_during_walk() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(IGNORE_FILENAME), "*.secret\n").unwrap();
        fs::write(dir.path().join("a.secret"), b"s").unwrap();
        fs::write(dir.path().join("a.txt"), b"t").unwrap();

        let mut patterns = PatternSet::new();
        let seen = collect(dir.path(), &mut patterns);
        let names: Vec<_> = seen.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"a.txt"));
        assert!(names.contains(&IGNORE_FILENAME));
        assert!(!names.contains(&"a.secret"));
    }

    #[test]
    fn nested_ignore_file_scoped_to_its_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join(IGNORE_FILENAME), "*.tmp\n").unwrap();
        fs::write(dir.path().join("sub").join("x.tmp"), b"x").unwrap();
        fs::write(dir.path().join("root.tmp"), b"r").unwrap();

        let mut patterns = PatternSet::new();
        let seen = collect(dir.path(), &mut patterns);
        let names: Vec<_> = seen.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"root.tmp"));
        assert!(!names.contains(&"sub/x.tmp"));
    }

    #[test]
    fn walk_missing_dir_is_an_error() {
        let mut patterns = PatternSet::new();
        let err = walk_tree(
            Path::new("/nonexistent/path/for/walker"),
            &mut patterns,
            &mut |_, _, _| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(err, BundleError::File { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dir_reported_under_link_path() {
        let real = TempDir::new().unwrap();
        fs::write(real.path().join("inner.txt"), b"i").unwrap();
        fs::create_dir(real.path().join("deep")).unwrap();
        fs::write(real.path().join("deep").join("leaf.txt"), b"l").unwrap();

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(real.path(), dir.path().join("linked")).unwrap();

        let mut patterns = PatternSet::new();
        let seen = collect(dir.path(), &mut patterns);
        assert_eq!(
            seen,
            vec![
                ("linked".to_string(), true),
                ("linked/deep".to_string(), true),
                ("linked/deep/leaf.txt".to_string(), false),
                ("linked/inner.txt".to_string(), false),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_file_visited_at_link_path() {
        let real = TempDir::new().unwrap();
        fs::write(real.path().join("target.txt"), b"data").unwrap();

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(
            real.path().join("target.txt"),
            dir.path().join("alias.txt"),
        )
        .unwrap();

        let mut patterns = PatternSet::new();
        let seen = collect(dir.path(), &mut patterns);
        assert_eq!(seen, vec![("alias.txt".to_string(), false)]);
    }

    #[cfg(unix)]
    #[test]
    fn broken_symlink_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling"))
            .unwrap();

        let mut patterns = PatternSet::new();
        let err = walk_tree(dir.path(), &mut patterns, &mut |_, _, _| Ok(())).unwrap_err();
        assert!(matches!(err, BundleError::File { .. }));
    }
}
