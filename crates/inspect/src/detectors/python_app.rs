//! Detector for the Python web-framework family.
//!
//! One implementation, one instance per content type; each instance owns
//! the import signatures that identify its framework.

use std::path::Path;

use podium_config::{Config, ContentType, PythonConfig};

use crate::detectors::{file_has_python_imports, find_entrypoint, ContentTypeInferer};
use crate::InspectError;

const ENTRYPOINT_NAMES: &[&str] = &["app.py", "main.py", "streamlit_app.py", "api.py"];

pub struct PythonAppDetector {
    content_type: ContentType,
    imports: &'static [&'static str],
}

impl PythonAppDetector {
    fn new(content_type: ContentType, imports: &'static [&'static str]) -> Self {
        Self {
            content_type,
            imports,
        }
    }

    pub fn fastapi() -> Self {
        Self::new(
            ContentType::PythonFastapi,
            // falcon.asgi must be checked before the flask detector's
            // plain falcon signature.
            &["fastapi", "falcon.asgi", "quart", "sanic", "starlette", "vetiver"],
        )
    }

    pub fn flask() -> Self {
        Self::new(
            ContentType::PythonFlask,
            // flask also matches flask_api, flask_openapi3, etc.
            &["flask", "flasgger", "falcon", "bottle", "pycnic"],
        )
    }

    pub fn dash() -> Self {
        // dash also matches dash_core_components, dash_bio, etc.
        Self::new(ContentType::PythonDash, &["dash"])
    }

    pub fn streamlit() -> Self {
        Self::new(ContentType::PythonStreamlit, &["streamlit"])
    }

    pub fn bokeh() -> Self {
        Self::new(ContentType::PythonBokeh, &["bokeh"])
    }
}

impl ContentTypeInferer for PythonAppDetector {
    fn infer_type(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError> {
        let Some(entrypoint) = find_entrypoint(base, hint, "py", ENTRYPOINT_NAMES)? else {
            return Ok(Vec::new());
        };
        if !file_has_python_imports(&base.join(&entrypoint), self.imports)? {
            return Ok(Vec::new());
        }
        let mut cfg = Config::new(self.content_type, entrypoint);
        // Version is filled in by Python inspection.
        cfg.python = Some(PythonConfig::default());
        Ok(vec![cfg])
    }
}
