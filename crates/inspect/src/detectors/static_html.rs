//! Static HTML detector. Lowest priority: everything renders to HTML
//! eventually, so this only wins when nothing else matched.

use std::path::Path;

use podium_config::{Config, ContentType};

use crate::detectors::helpers::rel_name;
use crate::detectors::{glob_files, ContentTypeInferer};
use crate::InspectError;

pub struct StaticHtmlDetector;

impl StaticHtmlDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StaticHtmlDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTypeInferer for StaticHtmlDetector {
    fn infer_type(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError> {
        if let Some(hint) = hint {
            if (hint.ends_with(".html") || hint.ends_with(".htm")) && base.join(hint).is_file() {
                return Ok(vec![Config::new(ContentType::Html, hint)]);
            }
            return Ok(Vec::new());
        }

        let mut files = glob_files(base, &["html", "htm"])?;
        // index.html is the conventional site root.
        if let Some(pos) = files
            .iter()
            .position(|p| p.file_name().is_some_and(|n| n == "index.html"))
        {
            files.rotate_left(pos);
            files.truncate(1);
        }
        Ok(files
            .iter()
            .map(|path| Config::new(ContentType::Html, rel_name(base, path)))
            .collect())
    }
}
