//! Configuration sections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ContentType;

/// A project configuration: the detected content type, entrypoint, and the
/// runtime/resource sections the host needs to serve it.
///
/// Optional sections serialize only when present so persisted configurations
/// stay minimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub entrypoint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Re-check the deployed content by fetching it after deployment.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub validate: bool,
    /// Explicit file inclusion list; empty means "walk the directory".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Environment variables set on the content item before deployment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<RConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarto: Option<QuartoConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesConfig>,
}

impl Config {
    /// A minimal configuration for the given type and entrypoint.
    pub fn new(content_type: ContentType, entrypoint: impl Into<String>) -> Self {
        Self {
            content_type,
            entrypoint: entrypoint.into(),
            title: String::new(),
            description: String::new(),
            validate: false,
            files: Vec::new(),
            environment: BTreeMap::new(),
            python: None,
            r: None,
            quarto: None,
            access: None,
            runtime: None,
            kubernetes: None,
        }
    }
}

/// Python runtime requirement. An empty version means "inspection needed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PythonConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default = "PythonConfig::default_package_file")]
    pub package_file: String,
    #[serde(default = "PythonConfig::default_package_manager")]
    pub package_manager: String,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            package_file: Self::default_package_file(),
            package_manager: Self::default_package_manager(),
        }
    }
}

impl PythonConfig {
    pub fn default_package_file() -> String {
        "requirements.txt".into()
    }

    pub fn default_package_manager() -> String {
        "pip".into()
    }
}

/// R runtime requirement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package_file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package_manager: String,
}

/// Quarto requirement, filled in by the Quarto detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuartoConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub engines: Vec<String>,
}

/// Process identity settings. Both require administrator role on the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_as: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_current_user: Option<bool>,
}

/// Worker process bounds, checked against the host's scheduler limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_processes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<i64>,
}

/// Off-host execution resources. Only valid when the host runs in
/// Kubernetes execution mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_image_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amd_gpu_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nvidia_gpu_limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_omits_empty_sections() {
        let cfg = Config::new(ContentType::Html, "index.html");
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("python"));
        assert!(!json.contains("title"));
        assert!(!json.contains("validate"));
        assert!(json.contains("\"type\":\"html\""));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn python_section_defaults() {
        let cfg: PythonConfig = serde_json::from_str("{\"version\": \"3.11.2\"}").unwrap();
        assert_eq!(cfg.package_file, "requirements.txt");
        assert_eq!(cfg.package_manager, "pip");
    }

    #[test]
    fn full_config_roundtrip() {
        let mut cfg = Config::new(ContentType::PythonDash, "app.py");
        cfg.title = "My Dashboard".into();
        cfg.python = Some(PythonConfig {
            version: "3.11.2".into(),
            package_file: "requirements.txt".into(),
            package_manager: "pip".into(),
        });
        cfg.runtime = Some(RuntimeConfig {
            min_processes: Some(1),
            max_processes: Some(4),
        });
        cfg.environment.insert("LOG_LEVEL".into(), "debug".into());

        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, parsed);
    }
}
