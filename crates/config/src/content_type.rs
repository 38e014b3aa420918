//! Content type classification.

use serde::{Deserialize, Serialize};

/// The detected kind of publishable project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Html,
    JupyterNotebook,
    JupyterVoila,
    PythonBokeh,
    PythonDash,
    PythonFastapi,
    PythonFlask,
    PythonShiny,
    PythonStreamlit,
    Quarto,
    RPlumber,
    RShiny,
    Unknown,
}

impl ContentType {
    /// Interactive application types. Only these may run as the current user.
    pub fn is_app_content(self) -> bool {
        matches!(
            self,
            ContentType::PythonBokeh
                | ContentType::PythonDash
                | ContentType::PythonShiny
                | ContentType::PythonStreamlit
                | ContentType::RShiny
        )
    }

    /// API types, gated by the host's API license flag.
    pub fn is_api_content(self) -> bool {
        matches!(
            self,
            ContentType::PythonFastapi | ContentType::PythonFlask | ContentType::RPlumber
        )
    }

    /// Static content is served as-is and never scheduled.
    pub fn is_static_content(self) -> bool {
        matches!(self, ContentType::Html)
    }

    /// The app-mode tag recorded in bundle manifests and used to scope
    /// scheduler settings queries.
    pub fn app_mode(self) -> &'static str {
        match self {
            ContentType::Html => "static",
            ContentType::JupyterNotebook => "jupyter-static",
            ContentType::JupyterVoila => "jupyter-voila",
            ContentType::PythonBokeh => "python-bokeh",
            ContentType::PythonDash => "python-dash",
            ContentType::PythonFastapi => "python-fastapi",
            ContentType::PythonFlask => "python-api",
            ContentType::PythonShiny => "python-shiny",
            ContentType::PythonStreamlit => "python-streamlit",
            ContentType::Quarto => "quarto-static",
            ContentType::RPlumber => "api",
            ContentType::RShiny => "shiny",
            ContentType::Unknown => "unknown",
        }
    }
}
