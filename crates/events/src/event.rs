//! Event shape: one operation, one phase, optional code and payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codes::{self, ErrorCode};

/// A named step of the publish pipeline, or the pipeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Publish,
    PublishCheckCapabilities,
    PublishCreateDeployment,
    PublishUpdateDeployment,
    PublishCreateBundle,
    PublishUploadBundle,
    PublishUpdateContentSettings,
    PublishSetEnvironment,
    PublishDeployBundle,
    PublishWaitForTask,
    PublishValidateDeployment,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Publish => "publish",
            Operation::PublishCheckCapabilities => "publish/checkCapabilities",
            Operation::PublishCreateDeployment => "publish/createDeployment",
            Operation::PublishUpdateDeployment => "publish/updateDeployment",
            Operation::PublishCreateBundle => "publish/createBundle",
            Operation::PublishUploadBundle => "publish/uploadBundle",
            Operation::PublishUpdateContentSettings => "publish/updateContentSettings",
            Operation::PublishSetEnvironment => "publish/setEnvironment",
            Operation::PublishDeployBundle => "publish/deployBundle",
            Operation::PublishWaitForTask => "publish/waitForTask",
            Operation::PublishValidateDeployment => "publish/validateDeployment",
        }
    }
}

/// Where in an operation's lifecycle an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Start,
    Progress,
    Log,
    Success,
    Failure,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Progress => "progress",
            Phase::Log => "log",
            Phase::Success => "success",
            Phase::Failure => "failure",
        }
    }
}

/// One structured progress event.
///
/// `local_id` groups every event from one publish invocation when several
/// publishes share an event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub local_id: String,
    pub operation: Operation,
    pub phase: Phase,
    #[serde(skip_serializing_if = "ErrorCode::is_empty")]
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(
        local_id: impl Into<String>,
        operation: Operation,
        phase: Phase,
        code: ErrorCode,
        data: serde_json::Value,
    ) -> Self {
        Self {
            time: Utc::now(),
            local_id: local_id.into(),
            operation,
            phase,
            code,
            data,
        }
    }

    pub fn start(local_id: impl Into<String>, operation: Operation) -> Self {
        Self::new(
            local_id,
            operation,
            Phase::Start,
            codes::NO_ERROR,
            serde_json::Value::Null,
        )
    }

    pub fn success(
        local_id: impl Into<String>,
        operation: Operation,
        data: serde_json::Value,
    ) -> Self {
        Self::new(local_id, operation, Phase::Success, codes::NO_ERROR, data)
    }

    pub fn failure(
        local_id: impl Into<String>,
        operation: Operation,
        code: ErrorCode,
        data: serde_json::Value,
    ) -> Self {
        Self::new(local_id, operation, Phase::Failure, code, data)
    }

    /// The event's type tag, `<operation>/<phase>` with the code appended
    /// on failures, e.g. `publish/uploadBundle/failure/serverError`.
    pub fn type_tag(&self) -> String {
        if self.phase == Phase::Failure && !self.code.0.is_empty() {
            format!("{}/{}/{}", self.operation.as_str(), self.phase.as_str(), self.code)
        } else {
            format!("{}/{}", self.operation.as_str(), self.phase.as_str())
        }
    }
}
