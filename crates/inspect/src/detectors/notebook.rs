//! Jupyter notebook detector.

use std::path::Path;

use podium_config::{Config, ContentType, PythonConfig};

use crate::detectors::helpers::rel_name;
use crate::detectors::{glob_files, ContentTypeInferer};
use crate::InspectError;

pub struct NotebookDetector;

impl NotebookDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NotebookDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTypeInferer for NotebookDetector {
    fn infer_type(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError> {
        let candidates = match hint {
            Some(hint) if hint.ends_with(".ipynb") => {
                let path = base.join(hint);
                if path.is_file() { vec![path] } else { Vec::new() }
            }
            _ => glob_files(base, &["ipynb"])?,
        };

        let mut configs = Vec::new();
        for path in candidates {
            let mut cfg = Config::new(ContentType::JupyterNotebook, rel_name(base, &path));
            cfg.python = Some(PythonConfig::default());
            configs.push(cfg);
        }
        Ok(configs)
    }
}
