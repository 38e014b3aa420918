//! Ignore-pattern matching.
//!
//! Patterns use gitignore-style glob syntax and are compiled to anchored
//! regexes. A leading `!` inverts a pattern (un-ignores). Patterns keep
//! their source (built-in, caller, or ignore file with path and line) so
//! diagnostics can say exactly why a file was excluded.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::BundleError;

/// Default exclusions applied to every directory bundle.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git/",
    ".podium/",
    ".DS_Store",
    "__pycache__/",
    "*.pyc",
    ".venv/",
    "venv/",
    ".Rproj.user/",
    "renv/library/",
    "manifest.json",
];

/// Where an ignore pattern came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchSource {
    BuiltIn,
    Caller,
    File,
}

/// One compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: MatchSource,
    /// The pattern as written, without any `!` prefix.
    pub pattern: String,
    /// True if this pattern un-ignores matching files.
    pub inverted: bool,
    /// Ignore file this pattern was read from, if any.
    pub file_path: Option<PathBuf>,
    /// 1-based line in that file, 0 if not from a file.
    pub line: usize,
    regex: Regex,
}

impl Pattern {
    fn compile(
        glob: &str,
        inverted: bool,
        source: MatchSource,
        file_path: Option<PathBuf>,
        line: usize,
        prefix: &str,
    ) -> Result<Self, BundleError> {
        let body = glob.trim_end_matches('/');
        if body.is_empty() {
            return Err(BundleError::Pattern {
                pattern: glob.into(),
                reason: "empty pattern".into(),
            });
        }

        let mut re = String::from("^");
        if !prefix.is_empty() {
            re.push_str(&regex::escape(prefix.trim_end_matches('/')));
            re.push('/');
        }
        // A pattern without a slash matches at any depth below its root;
        // a pattern with a slash is anchored there.
        if !body.contains('/') {
            re.push_str("(?:.*/)?");
        }
        re.push_str(&glob_to_regex(body));
        // Matching a directory excludes everything beneath it.
        re.push_str("(?:/.*)?$");

        let regex = Regex::new(&re).map_err(|e| BundleError::Pattern {
            pattern: glob.into(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source,
            pattern: glob.into(),
            inverted,
            file_path,
            line,
            regex,
        })
    }

    /// Tests a POSIX-style relative path against this pattern.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.regex.is_match(rel_path)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::new();
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` spans zero or more directories.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out
}

/// An ordered list of ignore patterns. Later patterns win, which is what
/// makes `!` un-ignore rules work.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set seeded with [`DEFAULT_IGNORES`].
    pub fn with_defaults() -> Result<Self, BundleError> {
        let mut set = Self::new();
        for glob in DEFAULT_IGNORES {
            set.add(glob, MatchSource::BuiltIn)?;
        }
        Ok(set)
    }

    /// Adds one pattern. A leading `!` marks it inverted.
    pub fn add(&mut self, glob: &str, source: MatchSource) -> Result<(), BundleError> {
        self.add_at(glob, source, None, 0, "")
    }

    fn add_at(
        &mut self,
        glob: &str,
        source: MatchSource,
        file_path: Option<PathBuf>,
        line: usize,
        prefix: &str,
    ) -> Result<(), BundleError> {
        let (inverted, body) = match glob.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, glob),
        };
        self.patterns.push(Pattern::compile(
            body, inverted, source, file_path, line, prefix,
        )?);
        Ok(())
    }

    /// Reads an ignore file discovered during the walk. `prefix` is the
    /// walked-root-relative directory containing the file; its patterns
    /// apply below that directory only.
    pub fn add_from_file(&mut self, file_path: &Path, prefix: &str) -> Result<(), BundleError> {
        let content =
            std::fs::read_to_string(file_path).map_err(|e| BundleError::file(file_path, e))?;
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.add_at(
                line,
                MatchSource::File,
                Some(file_path.to_path_buf()),
                idx + 1,
                prefix,
            )?;
        }
        Ok(())
    }

    /// Returns the deciding pattern for a path, if any. The last matching
    /// pattern wins.
    pub fn matched(&self, rel_path: &str) -> Option<&Pattern> {
        self.patterns.iter().rev().find(|p| p.matches(rel_path))
    }

    /// True if the path should be left out of the bundle.
    pub fn excluded(&self, rel_path: &str) -> bool {
        self.matched(rel_path).is_some_and(|p| !p.inverted)
    }
}
