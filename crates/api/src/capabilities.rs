//! Capability validation: checks a configuration against the host's
//! settings, license flags, and scheduler limits before publishing.
//!
//! Checks run in a fixed order and the first failure wins. Every failure
//! carries the offending field and bounds so UIs can render actionable
//! diagnostics.

use std::path::{Path, PathBuf};

use tracing::info;

use podium_config::Config;
use podium_events::{codes, Coded, ErrorCode};

use crate::client::ServerClient;
use crate::settings::{
    ApplicationSettings, PythonInfo, SchedulerSettings, ServerSettings, User,
    EXECUTION_TYPE_KUBERNETES,
};
use crate::ApiError;

/// Longest accepted content description.
const MAX_DESCRIPTION_LEN: usize = 4096;

/// A capability violation, or a failure to fetch the settings needed to
/// check for one.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(
        "can't find the package file {path} in the project directory; \
         create it or scan your project dependencies first"
    )]
    RequirementsFileMissing { path: PathBuf },

    #[error("API deployment is not licensed on this server")]
    ApisNotLicensed,

    #[error("the description cannot be longer than {max} characters")]
    DescriptionTooLong { length: usize, max: usize },

    #[error(
        "the configured Python version is not available on the server; \
         request one of the available versions instead"
    )]
    PythonNotAvailable {
        requested: String,
        available: Vec<String>,
    },

    #[error("{key} requires administrator privileges")]
    AdminPrivilegesRequired { key: String },

    #[error("run-as-current-user is not licensed on this server")]
    CurrentUserExecutionNotLicensed,

    #[error("run-as-current-user is not configured on this server")]
    CurrentUserExecutionNotConfigured,

    #[error("run-as-current-user can only be used with application types")]
    OnlyAppsCanRunAsCurrentUser,

    #[error("runtime settings cannot be applied to static content")]
    RuntimeSettingsForStaticContent,

    #[error("{key} value {value} is outside the allowed range [{min}, {max}]")]
    ValueOutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{key} value {value} is greater than {max_key} ({max})")]
    MinGreaterThanMax {
        key: String,
        max_key: String,
        value: f64,
        max: f64,
    },

    #[error("off-host execution with Kubernetes is not licensed on this server")]
    KubernetesNotLicensed,

    #[error("off-host execution with Kubernetes is not configured on this server")]
    KubernetesNotConfigured,

    #[error("default image selection is not enabled on this server")]
    ImageSelectionNotEnabled,
}

impl Coded for CapabilityError {
    fn code(&self) -> ErrorCode {
        match self {
            CapabilityError::Api(err) => err.code(),
            CapabilityError::RequirementsFileMissing { .. } => codes::REQUIREMENTS_FILE_MISSING,
            CapabilityError::ApisNotLicensed => codes::APIS_NOT_LICENSED,
            CapabilityError::DescriptionTooLong { .. } => codes::DESCRIPTION_TOO_LONG,
            CapabilityError::PythonNotAvailable { .. } => codes::PYTHON_NOT_AVAILABLE,
            CapabilityError::AdminPrivilegesRequired { .. } => codes::ADMIN_PRIVILEGES_REQUIRED,
            CapabilityError::CurrentUserExecutionNotLicensed => {
                codes::CURRENT_USER_EXECUTION_NOT_LICENSED
            }
            CapabilityError::CurrentUserExecutionNotConfigured => {
                codes::CURRENT_USER_EXECUTION_NOT_CONFIGURED
            }
            CapabilityError::OnlyAppsCanRunAsCurrentUser => {
                codes::ONLY_APPS_CAN_RUN_AS_CURRENT_USER
            }
            CapabilityError::RuntimeSettingsForStaticContent => {
                codes::RUNTIME_SETTINGS_FOR_STATIC_CONTENT
            }
            CapabilityError::ValueOutOfRange { .. } => codes::VALUE_OUT_OF_RANGE,
            CapabilityError::MinGreaterThanMax { .. } => codes::MIN_GREATER_THAN_MAX,
            CapabilityError::KubernetesNotLicensed => codes::KUBERNETES_NOT_LICENSED,
            CapabilityError::KubernetesNotConfigured => codes::KUBERNETES_NOT_CONFIGURED,
            CapabilityError::ImageSelectionNotEnabled => codes::IMAGE_SELECTION_NOT_ENABLED,
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            CapabilityError::Api(err) => err.details(),
            CapabilityError::RequirementsFileMissing { path } => {
                serde_json::json!({"path": path})
            }
            CapabilityError::DescriptionTooLong { length, max } => {
                serde_json::json!({"length": length, "max": max})
            }
            CapabilityError::PythonNotAvailable {
                requested,
                available,
            } => serde_json::json!({"requested": requested, "available": available}),
            CapabilityError::AdminPrivilegesRequired { key } => serde_json::json!({"key": key}),
            CapabilityError::ValueOutOfRange {
                key,
                value,
                min,
                max,
            } => serde_json::json!({"key": key, "value": value, "min": min, "max": max}),
            CapabilityError::MinGreaterThanMax {
                key,
                max_key,
                value,
                max,
            } => serde_json::json!({"key": key, "maxKey": max_key, "value": value, "max": max}),
            _ => serde_json::Value::Null,
        }
    }
}

/// All settings needed for one capability check. Fetched per publish
/// attempt; lifetime ends with the check.
#[derive(Debug, Clone, Default)]
pub struct AllSettings {
    pub user: User,
    pub general: ServerSettings,
    pub application: ApplicationSettings,
    /// `None` for static content, which is never scheduled.
    pub scheduler: Option<SchedulerSettings>,
    pub python: PythonInfo,
}

impl AllSettings {
    pub async fn fetch<C: ServerClient>(client: &C, cfg: &Config) -> Result<Self, ApiError> {
        let user = client.test_authentication().await?;
        let general = client.server_settings().await?;
        let application = client.application_settings().await?;
        let scheduler = if cfg.content_type.is_static_content() {
            None
        } else {
            Some(
                client
                    .scheduler_settings(cfg.content_type.app_mode())
                    .await?,
            )
        };
        let python = client.python_info().await?;
        Ok(Self {
            user,
            general,
            application,
            scheduler,
            python,
        })
    }

    /// Runs the ordered checks; the first failure short-circuits.
    pub fn check_config(&self, cfg: &Config) -> Result<(), CapabilityError> {
        if cfg.content_type.is_api_content() && !self.general.license.allow_apis {
            return Err(CapabilityError::ApisNotLicensed);
        }
        if cfg.description.len() > MAX_DESCRIPTION_LEN {
            return Err(CapabilityError::DescriptionTooLong {
                length: cfg.description.len(),
                max: MAX_DESCRIPTION_LEN,
            });
        }
        if let Some(python) = &cfg.python {
            if !python.version.is_empty() {
                self.check_matching_python(&python.version)?;
            }
        }
        self.check_access(cfg)?;
        self.check_runtime(cfg)?;
        self.check_kubernetes(cfg)?;
        Ok(())
    }

    fn check_matching_python(&self, version: &str) -> Result<(), CapabilityError> {
        let requested = major_minor(version);
        let matched = self
            .python
            .installations
            .iter()
            .any(|inst| major_minor(&inst.version) == requested);
        if matched {
            return Ok(());
        }
        Err(CapabilityError::PythonNotAvailable {
            requested,
            available: self
                .python
                .installations
                .iter()
                .map(|inst| inst.version.clone())
                .collect(),
        })
    }

    fn check_access(&self, cfg: &Config) -> Result<(), CapabilityError> {
        let Some(access) = &cfg.access else {
            return Ok(());
        };
        if access.run_as_current_user == Some(true) {
            if !self.general.license.current_user_execution {
                return Err(CapabilityError::CurrentUserExecutionNotLicensed);
            }
            if !self.application.run_as_current_user {
                return Err(CapabilityError::CurrentUserExecutionNotConfigured);
            }
            if !self.user.can_admin() {
                return Err(CapabilityError::AdminPrivilegesRequired {
                    key: "run-as-current-user".into(),
                });
            }
            if !cfg.content_type.is_app_content() {
                return Err(CapabilityError::OnlyAppsCanRunAsCurrentUser);
            }
        }
        if !access.run_as.is_empty() && !self.user.can_admin() {
            return Err(CapabilityError::AdminPrivilegesRequired {
                key: "run-as".into(),
            });
        }
        Ok(())
    }

    fn check_runtime(&self, cfg: &Config) -> Result<(), CapabilityError> {
        let Some(runtime) = &cfg.runtime else {
            return Ok(());
        };
        if cfg.content_type.is_static_content() {
            return Err(CapabilityError::RuntimeSettingsForStaticContent);
        }
        let Some(s) = &self.scheduler else {
            return Ok(());
        };
        check_max_i64("max-processes", runtime.max_processes, s.max_processes_limit)?;
        check_max_i64("min-processes", runtime.min_processes, s.min_processes_limit)?;
        check_min_max_i64(
            "min-processes",
            runtime.min_processes,
            s.min_processes,
            "max-processes",
            runtime.max_processes,
            s.max_processes,
        )?;
        Ok(())
    }

    fn check_kubernetes(&self, cfg: &Config) -> Result<(), CapabilityError> {
        let Some(k) = &cfg.kubernetes else {
            return Ok(());
        };
        if !self.general.license.launcher_enabled {
            return Err(CapabilityError::KubernetesNotLicensed);
        }
        if self.general.execution_type != EXECUTION_TYPE_KUBERNETES {
            return Err(CapabilityError::KubernetesNotConfigured);
        }
        if !k.default_image_name.is_empty() && !self.general.default_image_selection_enabled {
            return Err(CapabilityError::ImageSelectionNotEnabled);
        }
        if !k.service_account_name.is_empty() && !self.user.can_admin() {
            return Err(CapabilityError::AdminPrivilegesRequired {
                key: "service-account-name".into(),
            });
        }
        let Some(s) = &self.scheduler else {
            return Ok(());
        };
        check_max_f64("cpu-request", k.cpu_request, s.max_cpu_request)?;
        check_max_f64("cpu-limit", k.cpu_limit, s.max_cpu_limit)?;
        check_max_i64("memory-request", k.memory_request, s.max_memory_request)?;
        check_max_i64("memory-limit", k.memory_limit, s.max_memory_limit)?;
        check_max_i64("amd-gpu-limit", k.amd_gpu_limit, s.max_amd_gpu_limit)?;
        check_max_i64("nvidia-gpu-limit", k.nvidia_gpu_limit, s.max_nvidia_gpu_limit)?;

        // Requests cannot exceed limits; server defaults fill unset sides.
        check_min_max_f64(
            "cpu-request",
            k.cpu_request,
            s.cpu_request,
            "cpu-limit",
            k.cpu_limit,
            s.cpu_limit,
        )?;
        check_min_max_i64(
            "memory-request",
            k.memory_request,
            s.memory_request,
            "memory-limit",
            k.memory_limit,
            s.memory_limit,
        )?;
        Ok(())
    }
}

/// Checks the configured package file on disk, fetches the host's
/// settings, and validates `cfg` against them.
pub async fn check_capabilities<C: ServerClient>(
    client: &C,
    base: &Path,
    cfg: &Config,
) -> Result<(), CapabilityError> {
    if let Some(python) = &cfg.python {
        check_requirements_file(base, &python.package_file)?;
    }
    let settings = AllSettings::fetch(client, cfg).await?;
    settings.check_config(cfg)?;
    info!("configuration is within server capabilities");
    Ok(())
}

fn check_requirements_file(base: &Path, package_file: &str) -> Result<(), CapabilityError> {
    let path = base.join(package_file);
    if !path.is_file() {
        return Err(CapabilityError::RequirementsFileMissing { path });
    }
    Ok(())
}

fn major_minor(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

fn check_max_i64(key: &str, value: Option<i64>, limit: i64) -> Result<(), CapabilityError> {
    let Some(value) = value else {
        return Ok(());
    };
    // A zero limit means the host enforces none.
    if limit == 0 {
        return Ok(());
    }
    if value < 0 || value > limit {
        return Err(CapabilityError::ValueOutOfRange {
            key: key.into(),
            value: value as f64,
            min: 0.0,
            max: limit as f64,
        });
    }
    Ok(())
}

fn check_max_f64(key: &str, value: Option<f64>, limit: f64) -> Result<(), CapabilityError> {
    let Some(value) = value else {
        return Ok(());
    };
    if limit == 0.0 {
        return Ok(());
    }
    if value < 0.0 || value > limit {
        return Err(CapabilityError::ValueOutOfRange {
            key: key.into(),
            value,
            min: 0.0,
            max: limit,
        });
    }
    Ok(())
}

fn check_min_max_i64(
    min_key: &str,
    cfg_min: Option<i64>,
    default_min: i64,
    max_key: &str,
    cfg_max: Option<i64>,
    default_max: i64,
) -> Result<(), CapabilityError> {
    let min_value = cfg_min.unwrap_or(default_min);
    let max_value = cfg_max.unwrap_or(default_max);
    if max_value == 0 {
        return Ok(());
    }
    if min_value > max_value {
        return Err(CapabilityError::MinGreaterThanMax {
            key: min_key.into(),
            max_key: max_key.into(),
            value: min_value as f64,
            max: max_value as f64,
        });
    }
    Ok(())
}

fn check_min_max_f64(
    min_key: &str,
    cfg_min: Option<f64>,
    default_min: f64,
    max_key: &str,
    cfg_max: Option<f64>,
    default_max: f64,
) -> Result<(), CapabilityError> {
    let min_value = cfg_min.unwrap_or(default_min);
    let max_value = cfg_max.unwrap_or(default_max);
    if max_value == 0.0 {
        return Ok(());
    }
    if min_value > max_value {
        return Err(CapabilityError::MinGreaterThanMax {
            key: min_key.into(),
            max_key: max_key.into(),
            value: min_value,
            max: max_value,
        });
    }
    Ok(())
}
