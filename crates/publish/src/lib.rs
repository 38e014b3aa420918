//! The publish orchestrator.
//!
//! One publish is a strictly sequential pipeline of stages, terminal on
//! the first failure:
//!
//! ```text
//! preflight -> create/update content -> create bundle -> upload bundle
//!   -> update content settings -> set environment -> deploy bundle
//!   -> wait for task -> [validate] -> success
//! ```
//!
//! Every stage emits start and success/failure events; the publish as a
//! whole emits its own pair. A deployment record is persisted as soon as
//! a content id exists and after every stage that changes it, so a failed
//! publish still leaves a discoverable partial deployment.

mod publisher;
mod record;
mod registry;

pub use publisher::{dashboard_url, direct_url, PublishResult, Publisher};
pub use record::{DeploymentRecord, RecordedError, DEPLOYMENT_SCHEMA};
pub use registry::{ActiveDeployments, ActiveGuard};

use std::path::PathBuf;

use podium_api::{ApiError, CapabilityError, ContentId, TaskId};
use podium_bundle::BundleError;
use podium_events::{codes, Coded, ErrorCode};

/// Errors that stop a publish.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("couldn't write the deployment record {path}: {source}")]
    Record {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("couldn't decode the deployment record {path}: {source}")]
    RecordDecode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("deployment {content_id} no longer exists on the server")]
    DeploymentNotFound { content_id: ContentId },

    #[error("a publish of {name} is already in progress")]
    InProgress { name: String },

    #[error("configuration type changed from {previous} to {current} since the last deploy")]
    TypeChanged { previous: String, current: String },

    #[error("deployment task {task_id} failed: {message}")]
    TaskFailed { task_id: TaskId, message: String },

    #[error("timed out waiting for deployment task {task_id}")]
    TaskTimedOut { task_id: TaskId },

    #[error("couldn't stage the bundle file: {0}")]
    Staging(#[from] std::io::Error),
}

impl Coded for PublishError {
    fn code(&self) -> ErrorCode {
        match self {
            PublishError::Api(err) => err.code(),
            PublishError::Capability(err) => err.code(),
            PublishError::Bundle(_) => codes::BUNDLE_FAILED,
            PublishError::Record { .. } | PublishError::RecordDecode { .. } => codes::RECORD_FAILED,
            PublishError::DeploymentNotFound { .. } => codes::DEPLOYMENT_NOT_FOUND,
            PublishError::InProgress { .. } => codes::DEPLOYMENT_IN_PROGRESS,
            PublishError::TypeChanged { .. } => codes::TYPE_CHANGED,
            PublishError::TaskFailed { .. } => codes::TASK_FAILED,
            PublishError::TaskTimedOut { .. } => codes::TASK_TIMED_OUT,
            PublishError::Staging(_) => codes::BUNDLE_FAILED,
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            PublishError::Api(err) => err.details(),
            PublishError::Capability(err) => err.details(),
            PublishError::Record { path, .. } | PublishError::RecordDecode { path, .. } => {
                serde_json::json!({"path": path})
            }
            PublishError::DeploymentNotFound { content_id } => {
                serde_json::json!({"contentId": content_id})
            }
            PublishError::InProgress { name } => serde_json::json!({"name": name}),
            PublishError::TypeChanged { previous, current } => {
                serde_json::json!({"previous": previous, "current": current})
            }
            PublishError::TaskFailed { task_id, message } => {
                serde_json::json!({"taskId": task_id, "message": message})
            }
            PublishError::TaskTimedOut { task_id } => serde_json::json!({"taskId": task_id}),
            _ => serde_json::Value::Null,
        }
    }
}
