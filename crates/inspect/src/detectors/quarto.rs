//! Quarto project/document detector.
//!
//! Shells out to `quarto inspect` and reads its JSON: version, required
//! engines, title, and pre/post-render scripts. The engine list and script
//! languages decide whether the project also needs Python or R support.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use podium_config::{Config, ContentType, PythonConfig, QuartoConfig, RConfig};

use crate::detectors::helpers::rel_name;
use crate::detectors::{glob_files, ContentTypeInferer};
use crate::executor::{CommandRunner, ProcessRunner};
use crate::InspectError;

const QUARTO_PROJECT_FILE: &str = "_quarto.yml";

/// Subset of `quarto inspect` output; unknown fields are discarded.
#[derive(Debug, Default, Deserialize)]
struct InspectOutput {
    #[serde(default)]
    quarto: QuartoInfo,
    #[serde(default)]
    config: InspectConfig,
    #[serde(default)]
    engines: Vec<String>,
    #[serde(default)]
    files: InspectFiles,
    #[serde(default)]
    formats: Formats,
}

#[derive(Debug, Default, Deserialize)]
struct QuartoInfo {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Default, Deserialize)]
struct InspectConfig {
    #[serde(default)]
    project: ProjectConfig,
    #[serde(default)]
    website: WebsiteConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectConfig {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "pre-render")]
    pre_render: Vec<String>,
    #[serde(default, rename = "post-render")]
    post_render: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WebsiteConfig {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct InspectFiles {
    input: Option<Vec<String>>,
}

// Single documents without _quarto.yml report their title here.
#[derive(Debug, Default, Deserialize)]
struct Formats {
    #[serde(default)]
    html: HtmlFormat,
}

#[derive(Debug, Default, Deserialize)]
struct HtmlFormat {
    #[serde(default)]
    metadata: HtmlMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct HtmlMetadata {
    #[serde(default)]
    title: String,
}

impl InspectOutput {
    fn title(&self) -> &str {
        if !self.config.website.title.is_empty() {
            &self.config.website.title
        } else if !self.formats.html.metadata.title.is_empty() {
            &self.formats.html.metadata.title
        } else {
            &self.config.project.title
        }
    }

    fn render_script_with_suffix(&self, suffix: &str) -> bool {
        self.config
            .project
            .pre_render
            .iter()
            .chain(&self.config.project.post_render)
            .any(|script| script.ends_with(suffix))
    }

    fn needs_python(&self) -> bool {
        self.engines.iter().any(|e| e == "jupyter") || self.render_script_with_suffix(".py")
    }

    fn needs_r(&self) -> bool {
        self.engines.iter().any(|e| e == "knitr") || self.render_script_with_suffix(".R")
    }
}

pub struct QuartoDetector {
    runner: Arc<dyn CommandRunner>,
}

impl QuartoDetector {
    pub fn new() -> Self {
        Self {
            runner: Arc::new(ProcessRunner),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn quarto_inspect(&self, path: &Path) -> Result<InspectOutput, InspectError> {
        let target = path.to_string_lossy();
        let out = self
            .runner
            .run(Path::new("quarto"), &["inspect", &*target], None)
            .map_err(|e| InspectError::CommandFailed {
                program: "quarto".into(),
                source: e,
            })?;
        Ok(serde_json::from_slice(&out.stdout)?)
    }

    fn find_entrypoints(&self, base: &Path, hint: Option<&str>) -> Result<Vec<PathBuf>, InspectError> {
        if let Some(hint) = hint {
            let path = base.join(hint);
            return Ok(if path.is_file() { vec![path] } else { Vec::new() });
        }
        // Without a project file only .qmd documents are claimed, leaving
        // plain notebooks and R Markdown for the later detectors.
        if base.join(QUARTO_PROJECT_FILE).is_file() {
            glob_files(base, &["qmd", "Rmd", "ipynb"])
        } else {
            glob_files(base, &["qmd"])
        }
    }
}

impl Default for QuartoDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTypeInferer for QuartoDetector {
    fn infer_type(&self, base: &Path, hint: Option<&str>) -> Result<Vec<Config>, InspectError> {
        let entrypoints = self.find_entrypoints(base, hint)?;
        if entrypoints.is_empty() {
            return Ok(Vec::new());
        }
        let is_project = base.join(QUARTO_PROJECT_FILE).is_file();

        let mut configs = Vec::new();
        for entrypoint_path in entrypoints {
            let inspected = if is_project {
                self.quarto_inspect(base)
            } else {
                self.quarto_inspect(&entrypoint_path)
            };
            let inspected = match inspected {
                Ok(out) => out,
                Err(err) => {
                    // Maybe not a quarto project, or quarto isn't
                    // installed; let later detectors have a shot.
                    warn!(error = %err, "quarto inspect failed");
                    continue;
                }
            };
            if inspected
                .files
                .input
                .as_ref()
                .is_some_and(|input| input.is_empty())
            {
                continue;
            }

            let mut cfg = Config::new(ContentType::Quarto, rel_name(base, &entrypoint_path));
            cfg.title = inspected.title().to_string();
            cfg.quarto = Some(QuartoConfig {
                version: inspected.quarto.version.clone(),
                engines: inspected.engines.clone(),
            });
            if inspected.needs_python() {
                cfg.python = Some(PythonConfig::default());
            }
            if inspected.needs_r() {
                cfg.r = Some(RConfig::default());
            }
            configs.push(cfg);
        }
        Ok(configs)
    }
}
