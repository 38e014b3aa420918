//! Content-type detection and runtime inspection.
//!
//! Detection is an ordered chain of independent [`ContentTypeInferer`]
//! values, each proposing zero or more candidate configurations for a
//! directory. Inspection resolves a language runtime (executable, version,
//! dependency list) for a candidate that needs one.

pub mod detectors;
mod executor;
mod python;
mod r;

pub use detectors::{ContentTypeDetector, ContentTypeInferer};
pub use executor::{CommandOutput, CommandRunner, ProcessRunner};
pub use python::{PackageSpec, PythonInspector, RequirementsScan, REQUIREMENTS_FILENAME};
pub use r::{RInspector, RENV_LOCKFILE};

use std::path::{Path, PathBuf};

use podium_config::Config;

/// Fills in the runtime sections a detector marked as "inspection
/// needed" (an empty version) by resolving the actual interpreters.
pub fn refine_config(base: &Path, mut cfg: Config) -> Result<Config, InspectError> {
    if cfg.python.as_ref().is_some_and(|p| p.version.is_empty()) {
        cfg.python = Some(PythonInspector::new(base, None).inspect()?);
    }
    if cfg.r.as_ref().is_some_and(|r| r.version.is_empty()) {
        cfg.r = Some(RInspector::new(base, None).inspect()?);
    }
    Ok(cfg)
}

/// Errors from detection and inspection.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("error reading {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot find the specified executable {path}")]
    MissingExecutable { path: PathBuf },

    #[error("could not find a usable {name} executable on the search path")]
    ExecutableNotFound { name: String },

    #[error("couldn't parse {program} version from output: {output}")]
    VersionParse { program: String, output: String },

    #[error("{program} failed: {source}")]
    CommandFailed {
        program: String,
        source: std::io::Error,
    },
}

impl InspectError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InspectError::File {
            path: path.into(),
            source,
        }
    }
}
