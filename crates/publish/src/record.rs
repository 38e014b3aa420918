//! Deployment records: one JSON file per saved deployment name.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use podium_api::{BundleId, ContentId};
use podium_config::Config;

use crate::PublishError;

/// Schema tag written into every record.
pub const DEPLOYMENT_SCHEMA: &str = "https://podium.pub/schemas/deployment/v1.json";

/// Server type recorded for this host platform.
pub const SERVER_TYPE: &str = "podium";

const DEPLOYMENTS_DIR: &str = ".podium/deployments";

/// The error snapshot persisted when a publish fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

/// Persisted state of one saved deployment.
///
/// A record without a content id is a pre-deployment: created locally but
/// not yet assigned an identity by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub schema: String,
    pub server_type: String,
    pub server_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<ContentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<BundleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dashboard_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub direct_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordedError>,
}

impl DeploymentRecord {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            schema: DEPLOYMENT_SCHEMA.into(),
            server_type: SERVER_TYPE.into(),
            server_url: server_url.into(),
            content_id: None,
            bundle_id: None,
            config: None,
            files: Vec::new(),
            created_at: Utc::now(),
            deployed_at: None,
            dashboard_url: String::new(),
            direct_url: String::new(),
            error: None,
        }
    }

    /// True until the server has assigned a content id.
    pub fn is_pre_deployment(&self) -> bool {
        self.content_id.is_none()
    }

    /// Path of the record for `name` under the project directory.
    pub fn path(base: &Path, name: &str) -> PathBuf {
        base.join(DEPLOYMENTS_DIR).join(format!("{name}.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, PublishError> {
        let data = std::fs::read(path).map_err(|source| PublishError::Record {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| PublishError::RecordDecode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the record, creating the deployments directory as needed.
    /// The file is overwritten in full on every call.
    pub fn write_file(&self, path: &Path) -> Result<(), PublishError> {
        let wrap = |source| PublishError::Record {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|source| {
            PublishError::RecordDecode {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, json).map_err(wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_config::ContentType;
    use tempfile::TempDir;

    #[test]
    fn record_path_per_saved_name() {
        let path = DeploymentRecord::path(Path::new("/proj"), "staging");
        assert_eq!(
            path,
            Path::new("/proj/.podium/deployments/staging.json")
        );
    }

    #[test]
    fn pre_deployment_until_content_id_assigned() {
        let mut record = DeploymentRecord::new("https://host.example.com");
        assert!(record.is_pre_deployment());
        record.content_id = Some(ContentId::from("c-1"));
        assert!(!record.is_pre_deployment());
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = DeploymentRecord::path(dir.path(), "prod");

        let mut record = DeploymentRecord::new("https://host.example.com");
        record.content_id = Some(ContentId::from("c-42"));
        record.bundle_id = Some(BundleId::from("b-7"));
        record.config = Some(Config::new(ContentType::PythonStreamlit, "app.py"));
        record.files = vec!["app.py".into(), "requirements.txt".into()];
        record.write_file(&path).unwrap();

        let loaded = DeploymentRecord::from_file(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.schema, DEPLOYMENT_SCHEMA);
    }

    #[test]
    fn missing_record_file_errors_with_path() {
        let err = DeploymentRecord::from_file(Path::new("/no/such/record.json")).unwrap_err();
        assert!(matches!(err, PublishError::Record { .. }));
    }

    #[test]
    fn error_snapshot_serializes() {
        let mut record = DeploymentRecord::new("https://host.example.com");
        record.error = Some(RecordedError {
            code: "serverError".into(),
            message: "boom".into(),
            details: serde_json::json!({"status": 500}),
        });
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"code\":\"serverError\""));
    }
}
