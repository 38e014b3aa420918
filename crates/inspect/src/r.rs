//! R runtime inspection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use podium_config::RConfig;

use crate::executor::{CommandRunner, ProcessRunner};
use crate::InspectError;

/// The renv lockfile: both the package file shipped to the host and the
/// preferred source of the R version.
pub const RENV_LOCKFILE: &str = "renv.lock";

static R_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"R version (\d+\.\d+\.\d+)").expect("r version pattern"));

#[derive(Debug, Deserialize)]
struct RenvLock {
    #[serde(rename = "R")]
    r: RenvR,
}

#[derive(Debug, Deserialize)]
struct RenvR {
    #[serde(rename = "Version")]
    version: String,
}

/// Inspects a project's R runtime. Lockfile first: when `renv.lock`
/// declares a version, R itself is never invoked.
pub struct RInspector {
    base: PathBuf,
    r_path: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
    version_cache: Mutex<HashMap<PathBuf, String>>,
}

impl RInspector {
    pub fn new(base: impl Into<PathBuf>, r_path: Option<PathBuf>) -> Self {
        Self::with_runner(base, r_path, Arc::new(ProcessRunner))
    }

    pub fn with_runner(
        base: impl Into<PathBuf>,
        r_path: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            base: base.into(),
            r_path,
            runner,
            version_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inspect(&self) -> Result<RConfig, InspectError> {
        let lockfile = self.base.join(RENV_LOCKFILE);
        let version = if lockfile.is_file() {
            let version = self.version_from_lockfile(&lockfile)?;
            info!(version, "using R version from renv lockfile");
            version
        } else {
            let exe = self.resolve_executable()?;
            self.version_of(&exe)?
        };
        Ok(RConfig {
            version,
            package_file: RENV_LOCKFILE.into(),
            package_manager: "renv".into(),
        })
    }

    fn version_from_lockfile(&self, lockfile: &Path) -> Result<String, InspectError> {
        let content = std::fs::read(lockfile).map_err(|e| InspectError::file(lockfile, e))?;
        let lock: RenvLock = serde_json::from_slice(&content)?;
        Ok(lock.r.version)
    }

    pub fn resolve_executable(&self) -> Result<PathBuf, InspectError> {
        if let Some(path) = &self.r_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(InspectError::MissingExecutable { path: path.clone() });
        }
        let Ok(found) = which::which("R") else {
            return Err(InspectError::ExecutableNotFound { name: "R".into() });
        };
        // Ensure R actually runs before trusting it.
        self.version_of(&found)?;
        debug!(r = %found.display(), "resolved R executable");
        Ok(found)
    }

    fn version_of(&self, exe: &Path) -> Result<String, InspectError> {
        if let Some(version) = self.version_cache.lock().unwrap().get(exe) {
            return Ok(version.clone());
        }
        let out = self
            .runner
            .run(exe, &["--version"], None)
            .map_err(|e| InspectError::CommandFailed {
                program: exe.display().to_string(),
                source: e,
            })?;
        let combined = out.combined();
        let first_line = combined.lines().next().unwrap_or_default();
        let version = R_VERSION_RE
            .captures(first_line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| InspectError::VersionParse {
                program: exe.display().to_string(),
                output: first_line.to_string(),
            })?;
        info!(r = %exe.display(), version, "detected R version");
        self.version_cache
            .lock()
            .unwrap()
            .insert(exe.to_path_buf(), version.clone());
        Ok(version)
    }
}
