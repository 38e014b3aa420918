//! Stable error codes shared across the publishing pipeline.

use serde::Serialize;

/// A machine-readable error code attached to failure events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

pub const NO_ERROR: ErrorCode = ErrorCode("");
pub const UNKNOWN: ErrorCode = ErrorCode("unknown");

// Transport and server failures.
pub const AUTHENTICATION_FAILED: ErrorCode = ErrorCode("authenticationFailed");
pub const PERMISSION_DENIED: ErrorCode = ErrorCode("permissionDenied");
pub const CONNECTION_FAILED: ErrorCode = ErrorCode("connectionFailed");
pub const TIMED_OUT: ErrorCode = ErrorCode("timedOut");
pub const SERVER_ERROR: ErrorCode = ErrorCode("serverError");
pub const NOT_FOUND_ON_SERVER: ErrorCode = ErrorCode("notFoundOnServer");

// Publish pipeline.
pub const DEPLOYMENT_NOT_FOUND: ErrorCode = ErrorCode("deploymentNotFound");
pub const DEPLOYMENT_IN_PROGRESS: ErrorCode = ErrorCode("deploymentInProgress");
pub const TYPE_CHANGED: ErrorCode = ErrorCode("typeChanged");
pub const TASK_FAILED: ErrorCode = ErrorCode("taskFailed");
pub const TASK_TIMED_OUT: ErrorCode = ErrorCode("taskTimedOut");
pub const VALIDATION_FAILED: ErrorCode = ErrorCode("validationFailed");
pub const BUNDLE_FAILED: ErrorCode = ErrorCode("bundleFailed");
pub const RECORD_FAILED: ErrorCode = ErrorCode("recordFailed");

// Capability checks.
pub const REQUIREMENTS_FILE_MISSING: ErrorCode = ErrorCode("requirementsFileMissing");
pub const APIS_NOT_LICENSED: ErrorCode = ErrorCode("apisNotLicensed");
pub const DESCRIPTION_TOO_LONG: ErrorCode = ErrorCode("descriptionTooLong");
pub const PYTHON_NOT_AVAILABLE: ErrorCode = ErrorCode("pythonNotAvailable");
pub const ADMIN_PRIVILEGES_REQUIRED: ErrorCode = ErrorCode("adminPrivilegesRequired");
pub const CURRENT_USER_EXECUTION_NOT_LICENSED: ErrorCode =
    ErrorCode("currentUserExecutionNotLicensed");
pub const CURRENT_USER_EXECUTION_NOT_CONFIGURED: ErrorCode =
    ErrorCode("currentUserExecutionNotConfigured");
pub const ONLY_APPS_CAN_RUN_AS_CURRENT_USER: ErrorCode = ErrorCode("onlyAppsCanRunAsCurrentUser");
pub const RUNTIME_SETTINGS_FOR_STATIC_CONTENT: ErrorCode =
    ErrorCode("runtimeSettingsForStaticContent");
pub const VALUE_OUT_OF_RANGE: ErrorCode = ErrorCode("valueOutOfRange");
pub const MIN_GREATER_THAN_MAX: ErrorCode = ErrorCode("minGreaterThanMax");
pub const KUBERNETES_NOT_LICENSED: ErrorCode = ErrorCode("kubernetesNotLicensed");
pub const KUBERNETES_NOT_CONFIGURED: ErrorCode = ErrorCode("kubernetesNotConfigured");
pub const IMAGE_SELECTION_NOT_ENABLED: ErrorCode = ErrorCode("imageSelectionNotEnabled");

// Credential store.
pub const CREDENTIAL_NOT_FOUND: ErrorCode = ErrorCode("credentialNotFound");
pub const CREDENTIAL_CORRUPTED: ErrorCode = ErrorCode("credentialCorrupted");
pub const UNKNOWN_CREDENTIAL_VERSION: ErrorCode = ErrorCode("unknownCredentialVersion");
pub const URL_COLLISION: ErrorCode = ErrorCode("urlCollision");
pub const NAME_COLLISION: ErrorCode = ErrorCode("nameCollision");
pub const ENV_URL_COLLISION: ErrorCode = ErrorCode("envUrlCollision");
pub const ENV_NAME_COLLISION: ErrorCode = ErrorCode("envNameCollision");
pub const ENV_CREDENTIAL_DELETE: ErrorCode = ErrorCode("envCredentialDelete");
