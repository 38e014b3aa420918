//! Bundle builder.
//!
//! Walks a project directory, applies ignore rules, and produces a
//! [`Manifest`] describing every included file by checksum — optionally
//! streaming the files into a gzip-compressed tar archive in the same
//! pass. The manifest itself is appended to the archive as its final
//! entry under [`MANIFEST_FILENAME`].

mod bundler;
mod manifest;
mod matcher;
mod walker;

pub use bundler::Bundler;
pub use manifest::{FileEntry, MANIFEST_FILENAME, Manifest, Package};
pub use matcher::{MatchSource, Pattern, PatternSet};
pub use walker::IGNORE_FILENAME;

use std::path::PathBuf;

/// Errors produced while building a bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error reading {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid ignore pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("bundle entries must be relative paths inside the project: {0}")]
    InvalidPath(String),
}

impl BundleError {
    /// Wraps an I/O error with the path that produced it.
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BundleError::File {
            path: path.into(),
            source,
        }
    }
}
