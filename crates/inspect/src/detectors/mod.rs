//! The content-type detector chain.
//!
//! Detectors are independent and ordered; each proposes zero or more
//! candidate configurations. Finding nothing is not an error — only I/O
//! failures propagate and stop the chain.

mod helpers;
mod notebook;
mod pyshiny;
mod python_app;
mod quarto;
mod rshiny;
mod static_html;

pub use notebook::NotebookDetector;
pub use pyshiny::PyShinyDetector;
pub use python_app::PythonAppDetector;
pub use quarto::QuartoDetector;
pub use rshiny::RShinyDetector;
pub use static_html::StaticHtmlDetector;

pub(crate) use helpers::{file_has_python_imports, find_entrypoint, glob_files};

use std::path::Path;

use podium_config::Config;

use crate::InspectError;

/// Infers as much as possible about the content in a directory. An empty
/// result means "no opinion", not failure.
pub trait ContentTypeInferer: Send + Sync {
    fn infer_type(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError>;
}

/// The fixed, priority-ordered detector chain.
pub struct ContentTypeDetector {
    detectors: Vec<Box<dyn ContentTypeInferer>>,
}

impl Default for ContentTypeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTypeDetector {
    pub fn new() -> Self {
        Self {
            detectors: vec![
                Box::new(QuartoDetector::new()),
                Box::new(PyShinyDetector::new()),
                Box::new(PythonAppDetector::fastapi()),
                Box::new(PythonAppDetector::flask()),
                Box::new(PythonAppDetector::dash()),
                Box::new(PythonAppDetector::streamlit()),
                Box::new(PythonAppDetector::bokeh()),
                Box::new(NotebookDetector::new()),
                Box::new(RShinyDetector::new()),
                Box::new(StaticHtmlDetector::new()),
            ],
        }
    }

    /// Returns the first candidate from the first detector with an
    /// opinion, or `None` when nothing matches.
    pub fn infer_type(
        &self,
        base: &Path,
        hint: Option<&str>,
    ) -> Result<Option<Config>, InspectError> {
        for detector in &self.detectors {
            let mut candidates = detector.infer_type(base, hint)?;
            if !candidates.is_empty() {
                return Ok(Some(candidates.remove(0)));
            }
        }
        Ok(None)
    }

    /// Collects every candidate from every detector, in chain order, for
    /// interactive selection.
    pub fn infer_all(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError> {
        let mut all = Vec::new();
        for detector in &self.detectors {
            all.extend(detector.infer_type(base, hint)?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_config::ContentType;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn streamlit_app_is_detected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "import streamlit as st\n").unwrap();

        let detector = ContentTypeDetector::new();
        let cfg = detector.infer_type(dir.path(), None).unwrap().unwrap();
        assert_eq!(cfg.content_type, ContentType::PythonStreamlit);
        assert_eq!(cfg.entrypoint, "app.py");
        assert!(cfg.python.is_some());
    }

    #[test]
    fn python_app_outranks_static_html() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>\n").unwrap();
        fs::write(dir.path().join("app.py"), "import dash\n").unwrap();

        let detector = ContentTypeDetector::new();
        let cfg = detector.infer_type(dir.path(), None).unwrap().unwrap();
        assert_eq!(cfg.content_type, ContentType::PythonDash);
    }

    #[test]
    fn empty_directory_has_no_opinion() {
        let dir = TempDir::new().unwrap();
        let detector = ContentTypeDetector::new();
        assert!(detector.infer_type(dir.path(), None).unwrap().is_none());
    }

    #[test]
    fn infer_all_collects_multiple_candidates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>\n").unwrap();
        fs::write(dir.path().join("app.py"), "import dash\n").unwrap();

        let detector = ContentTypeDetector::new();
        let all = detector.infer_all(dir.path(), None).unwrap();
        let types: Vec<_> = all.iter().map(|c| c.content_type).collect();
        assert!(types.contains(&ContentType::PythonDash));
        assert!(types.contains(&ContentType::Html));
        // Chain order: the dash candidate comes first.
        assert_eq!(types[0], ContentType::PythonDash);
    }
}
