//! R Shiny detector.

use std::path::Path;

use podium_config::{Config, ContentType, RConfig};

use crate::detectors::ContentTypeInferer;
use crate::InspectError;

const SHINY_ENTRYPOINTS: &[&str] = &["app.R", "server.R"];

pub struct RShinyDetector;

impl RShinyDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RShinyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTypeInferer for RShinyDetector {
    fn infer_type(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError> {
        let entrypoint = match hint {
            Some(hint) if SHINY_ENTRYPOINTS.contains(&hint) && base.join(hint).is_file() => {
                Some(hint.to_string())
            }
            Some(_) => None,
            None => SHINY_ENTRYPOINTS
                .iter()
                .find(|name| base.join(name).is_file())
                .map(|name| (*name).to_string()),
        };
        let Some(entrypoint) = entrypoint else {
            return Ok(Vec::new());
        };
        let mut cfg = Config::new(ContentType::RShiny, entrypoint);
        // Version and lockfile are filled in by R inspection.
        cfg.r = Some(RConfig::default());
        Ok(vec![cfg])
    }
}
