//! Shiny for Python detector.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use podium_config::{Config, ContentType, PythonConfig};

use crate::detectors::helpers::rel_name;
use crate::detectors::{file_has_python_imports, glob_files, ContentTypeInferer};
use crate::InspectError;

static SHINY_EXPRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(import\s+shiny\.express)|(from\s+shiny\.express\s+import)|(from\s+shiny\s+import.*\bexpress\b)")
        .expect("shiny express pattern")
});

static INVALID_IDENTIFIER_CHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^[0-9]|[^A-Za-z0-9_])").expect("identifier pattern"));

/// Synthesizes the module-style entrypoint a Shiny Express app is served
/// under. Every character that would not be valid in an identifier is
/// escaped to `_<hex>_`.
fn shiny_express_entrypoint(entrypoint: &str) -> String {
    let safe = INVALID_IDENTIFIER_CHAR_RE.replace_all(entrypoint, |caps: &regex::Captures<'_>| {
        let ch = caps[0].chars().next().unwrap_or('_');
        format!("_{:x}_", ch as u32)
    });
    format!("shiny.express.app:{safe}")
}

pub struct PyShinyDetector;

impl PyShinyDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PyShinyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTypeInferer for PyShinyDetector {
    fn infer_type(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError> {
        let candidates = match hint {
            Some(hint) if hint.ends_with(".py") => {
                let path = base.join(hint);
                if path.is_file() { vec![path] } else { Vec::new() }
            }
            _ => glob_files(base, &["py"])?,
        };

        let mut configs = Vec::new();
        for path in candidates {
            if !file_has_python_imports(&path, &["shiny"])? {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(|e| InspectError::file(&path, e))?;
            let content = String::from_utf8_lossy(&bytes);
            let entrypoint = rel_name(base, &path);

            let mut cfg = Config::new(
                ContentType::PythonShiny,
                if SHINY_EXPRESS_RE.is_match(&content) {
                    shiny_express_entrypoint(&entrypoint)
                } else {
                    entrypoint
                },
            );
            cfg.python = Some(PythonConfig::default());
            configs.push(cfg);
        }
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn classic_shiny_keeps_plain_entrypoint() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app.py"),
            "from shiny import App, ui\napp = App(ui.page_fluid())\n",
        )
        .unwrap();

        let found = PyShinyDetector::new().infer_type(dir.path(), None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content_type, ContentType::PythonShiny);
        assert_eq!(found[0].entrypoint, "app.py");
    }

    #[test]
    fn express_import_rewrites_entrypoint() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app.py"),
            "from shiny.express import input, render, ui\n",
        )
        .unwrap();

        let found = PyShinyDetector::new().infer_type(dir.path(), None).unwrap();
        assert_eq!(found[0].entrypoint, "shiny.express.app:app_2e_py");
    }

    #[test]
    fn escaping_covers_leading_digit_and_dashes() {
        assert_eq!(
            shiny_express_entrypoint("1-app.py"),
            "shiny.express.app:_31__2d_app_2e_py"
        );
    }

    #[test]
    fn non_shiny_py_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "import flask\n").unwrap();
        let found = PyShinyDetector::new().infer_type(dir.path(), None).unwrap();
        assert!(found.is_empty());
    }
}
