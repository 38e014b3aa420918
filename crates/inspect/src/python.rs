//! Python runtime inspection: interpreter resolution, version lookup,
//! and dependency scanning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tracing::{debug, info};

use podium_config::PythonConfig;

use crate::executor::{CommandRunner, ProcessRunner};
use crate::InspectError;

/// Package file consumed by the host's pip environment restore.
pub const REQUIREMENTS_FILENAME: &str = "requirements.txt";

/// Version-pinning file honored before the interpreter is consulted.
const VERSION_PIN_FILENAME: &str = ".python-version";

const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

static PYTHON_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Python (\d+\.\d+(?:\.\d+)?)").expect("python version pattern"));

static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*==\s*([A-Za-z0-9.!+*_-]+)\s*$")
        .expect("requirement pattern")
});

/// A resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
}

/// Result of scanning project dependencies.
#[derive(Debug, Clone, Default)]
pub struct RequirementsScan {
    /// Fully pinned `name==version` entries.
    pub packages: Vec<PackageSpec>,
    /// Entries with no resolvable version, reported so callers can warn
    /// without failing the scan.
    pub incomplete: Vec<String>,
    /// The interpreter consulted, when one was needed.
    pub python: Option<PathBuf>,
}

/// Inspects a project's Python runtime.
///
/// Version lookups are cached per absolute executable path for the life
/// of the inspector, so multi-candidate detection doesn't repeatedly
/// spawn interpreters.
pub struct PythonInspector {
    base: PathBuf,
    python_path: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
    version_cache: Mutex<HashMap<PathBuf, String>>,
}

impl PythonInspector {
    pub fn new(base: impl Into<PathBuf>, python_path: Option<PathBuf>) -> Self {
        Self::with_runner(base, python_path, Arc::new(ProcessRunner))
    }

    pub fn with_runner(
        base: impl Into<PathBuf>,
        python_path: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            base: base.into(),
            python_path,
            runner,
            version_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the project's Python version and package file.
    ///
    /// A `.python-version` pin wins over invoking the interpreter, which
    /// keeps version resolution reproducible on machines without the
    /// pinned runtime installed.
    pub fn inspect(&self) -> Result<PythonConfig, InspectError> {
        let version = match self.pinned_version()? {
            Some(version) => {
                info!(version, "using pinned python version");
                version
            }
            None => {
                let exe = self.resolve_executable()?;
                self.version_of(&exe)?
            }
        };
        Ok(PythonConfig {
            version,
            package_file: REQUIREMENTS_FILENAME.into(),
            package_manager: "pip".into(),
        })
    }

    /// Scans project dependencies: `requirements.txt` when present,
    /// otherwise the installed environment via `pip freeze`.
    pub fn scan_requirements(&self) -> Result<RequirementsScan, InspectError> {
        let requirements = self.base.join(REQUIREMENTS_FILENAME);
        if requirements.is_file() {
            let content = std::fs::read_to_string(&requirements)
                .map_err(|e| InspectError::file(&requirements, e))?;
            let mut scan = parse_requirements(&content);
            scan.python = None;
            return Ok(scan);
        }

        let exe = self.resolve_executable()?;
        debug!(python = %exe.display(), "scanning installed packages");
        let out = self
            .runner
            .run(&exe, &["-m", "pip", "freeze"], Some(&self.base))
            .map_err(|e| InspectError::CommandFailed {
                program: exe.display().to_string(),
                source: e,
            })?;
        let mut scan = parse_requirements(&String::from_utf8_lossy(&out.stdout));
        scan.python = Some(exe);
        Ok(scan)
    }

    fn pinned_version(&self) -> Result<Option<String>, InspectError> {
        let pin = self.base.join(VERSION_PIN_FILENAME);
        if !pin.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&pin).map_err(|e| InspectError::file(&pin, e))?;
        let version = content.trim();
        if version.is_empty() {
            return Ok(None);
        }
        Ok(Some(version.to_string()))
    }

    /// Resolution order: explicit path (must exist), then the first
    /// conventional name on the search path that actually runs.
    pub fn resolve_executable(&self) -> Result<PathBuf, InspectError> {
        if let Some(path) = &self.python_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(InspectError::MissingExecutable { path: path.clone() });
        }
        for name in PYTHON_CANDIDATES {
            let Ok(found) = which::which(name) else {
                continue;
            };
            match self.version_of(&found) {
                Ok(_) => {
                    debug!(python = %found.display(), "resolved python executable");
                    return Ok(found);
                }
                Err(err) => {
                    // A broken interpreter on PATH is skipped, not fatal.
                    debug!(python = %found.display(), error = %err, "candidate rejected");
                }
            }
        }
        Err(InspectError::ExecutableNotFound {
            name: "python".into(),
        })
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
        let version = PYTHON_VERSION_RE
            .captures(&combined)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| InspectError::VersionParse {
                program: exe.display().to_string(),
                output: combined.lines().next().unwrap_or_default().to_string(),
            })?;
        info!(python = %exe.display(), version, "detected python version");
        self.version_cache
            .lock()
            .unwrap()
            .insert(exe.to_path_buf(), version.clone());
        Ok(version)
    }
}

fn parse_requirements(content: &str) -> RequirementsScan {
    let mut scan = RequirementsScan::default();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match REQUIREMENT_RE.captures(line) {
            Some(caps) => scan.packages.push(PackageSpec {
                name: caps[1].to_string(),
                version: caps[2].to_string(),
            }),
            None => scan.incomplete.push(line.to_string()),
        }
    }
    scan
}
