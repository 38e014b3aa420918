//! Host API client and capability validation.
//!
//! [`ServerClient`] is the seam between the publish pipeline and the
//! host's HTTP API; [`HostClient`] is the real implementation. The
//! capability validator fetches the host's settings and checks a
//! configuration against them before anything is mutated remotely.

pub mod capabilities;
mod client;
mod host;
mod settings;
mod types;

pub use capabilities::{check_capabilities, AllSettings, CapabilityError};
pub use client::ServerClient;
pub use host::HostClient;
pub use settings::{
    ApplicationSettings, License, PythonInfo, PythonInstallation, SchedulerSettings,
    ServerSettings, User, EXECUTION_TYPE_KUBERNETES,
};
pub use types::{BundleId, ContentId, ContentSettings, Task, TaskId};

use podium_events::{codes, Coded, ErrorCode};

/// Errors from talking to the host.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unable to log in with the provided credentials")]
    AuthenticationFailed,

    #[error("the server denied permission for {url}")]
    PermissionDenied { url: String },

    #[error("the server returned not found for {url}")]
    NotFound { url: String },

    #[error("unexpected response from the server: {status} on {url}")]
    Server { status: u16, url: String },

    #[error("request to the server timed out")]
    TimedOut,

    #[error("couldn't reach the server: {0}")]
    Transport(reqwest::Error),

    #[error("couldn't read the bundle file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::TimedOut
        } else {
            ApiError::Transport(err)
        }
    }
}

impl Coded for ApiError {
    fn code(&self) -> ErrorCode {
        match self {
            ApiError::AuthenticationFailed => codes::AUTHENTICATION_FAILED,
            ApiError::PermissionDenied { .. } => codes::PERMISSION_DENIED,
            ApiError::NotFound { .. } => codes::NOT_FOUND_ON_SERVER,
            ApiError::Server { .. } => codes::SERVER_ERROR,
            ApiError::TimedOut => codes::TIMED_OUT,
            ApiError::Transport(_) => codes::CONNECTION_FAILED,
            ApiError::Io(_) => codes::UNKNOWN,
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            ApiError::PermissionDenied { url } | ApiError::NotFound { url } => {
                serde_json::json!({"url": url})
            }
            ApiError::Server { status, url } => serde_json::json!({"status": status, "url": url}),
            _ => serde_json::Value::Null,
        }
    }
}
