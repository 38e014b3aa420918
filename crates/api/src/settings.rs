//! Server-reported settings consumed by the capability validator.
//!
//! These are read-only snapshots fetched per publish attempt and never
//! persisted.

use serde::{Deserialize, Serialize};

/// Execution mode reported by hosts that launch content in Kubernetes.
pub const EXECUTION_TYPE_KUBERNETES: &str = "kubernetes";

/// The authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_role: String,
}

impl User {
    pub fn can_admin(&self) -> bool {
        self.user_role == "administrator"
    }
}

/// License flags relevant to publishing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(default)]
    pub allow_apis: bool,
    #[serde(default)]
    pub current_user_execution: bool,
    #[serde(default)]
    pub launcher_enabled: bool,
}

/// General server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub license: License,
    #[serde(default)]
    pub execution_type: String,
    #[serde(default)]
    pub default_image_selection_enabled: bool,
}

/// Per-application server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSettings {
    #[serde(default)]
    pub run_as_current_user: bool,
}

/// Scheduler limits scoped to one app mode.
///
/// A zero-valued maximum means the host enforces no limit for that
/// field, not that the limit is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default)]
    pub max_cpu_request: f64,
    #[serde(default)]
    pub max_cpu_limit: f64,
    #[serde(default)]
    pub cpu_request: f64,
    #[serde(default)]
    pub cpu_limit: f64,
    #[serde(default)]
    pub max_memory_request: i64,
    #[serde(default)]
    pub max_memory_limit: i64,
    #[serde(default)]
    pub memory_request: i64,
    #[serde(default)]
    pub memory_limit: i64,
    #[serde(default)]
    pub max_amd_gpu_limit: i64,
    #[serde(default)]
    pub max_nvidia_gpu_limit: i64,
    #[serde(default)]
    pub min_processes_limit: i64,
    #[serde(default)]
    pub max_processes_limit: i64,
    #[serde(default)]
    pub min_processes: i64,
    #[serde(default)]
    pub max_processes: i64,
}

/// Available Python installations on the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PythonInfo {
    #[serde(default)]
    pub installations: Vec<PythonInstallation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PythonInstallation {
    pub version: String,
}
