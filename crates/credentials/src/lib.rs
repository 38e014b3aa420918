//! Stored server credentials.
//!
//! Credentials persist as one opaque JSON blob in the platform secure
//! store, wrapped in versioned records so the schema can change without
//! breaking old tables. An ephemeral credential sourced from environment
//! variables is merged in at load time under a reserved GUID and never
//! written back.
//!
//! Not safe for concurrent writers across processes: the secure store
//! offers no compare-and-swap, so interleaved saves can lose writes.

mod record;
mod service;
mod store;
mod url_util;

pub use record::{Credential, CredentialRecord, CredentialTable, CURRENT_VERSION, ENV_GUID};
pub use service::{CredentialsService, ENV_KEY_VAR, ENV_URL_VAR, SERVICE_NAME, STORE_KEY};
pub use store::{KeyringStore, MemoryStore, SecretStore};
pub use url_util::normalize_server_url;

use podium_events::{codes, Coded, ErrorCode};

/// Errors from the credential store.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential {guid} not found")]
    NotFound { guid: String },

    #[error("credential {guid} is corrupted and cannot be decoded")]
    Corrupted { guid: String },

    #[error("credential record version {version} is not supported")]
    UnknownVersion { version: u32 },

    #[error("a credential for {url} already exists")]
    UrlCollision { name: String, url: String },

    #[error("a credential named {name} already exists")]
    NameCollision { name: String, url: String },

    #[error("{url} is already in use by the environment-variable credential")]
    EnvUrlCollision { name: String, url: String },

    #[error("{name} is already in use by the environment-variable credential")]
    EnvNameCollision { name: String, url: String },

    #[error("the environment-variable credential cannot be deleted")]
    EnvDelete,

    #[error("invalid server URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("secure store error: {0}")]
    Store(#[from] keyring::Error),

    #[error("failed to decode the credential table: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Coded for CredentialError {
    fn code(&self) -> ErrorCode {
        match self {
            CredentialError::NotFound { .. } => codes::CREDENTIAL_NOT_FOUND,
            CredentialError::Corrupted { .. } => codes::CREDENTIAL_CORRUPTED,
            CredentialError::UnknownVersion { .. } => codes::UNKNOWN_CREDENTIAL_VERSION,
            CredentialError::UrlCollision { .. } => codes::URL_COLLISION,
            CredentialError::NameCollision { .. } => codes::NAME_COLLISION,
            CredentialError::EnvUrlCollision { .. } => codes::ENV_URL_COLLISION,
            CredentialError::EnvNameCollision { .. } => codes::ENV_NAME_COLLISION,
            CredentialError::EnvDelete => codes::ENV_CREDENTIAL_DELETE,
            CredentialError::InvalidUrl { .. } => codes::UNKNOWN,
            CredentialError::Store(_) | CredentialError::Decode(_) => codes::UNKNOWN,
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            CredentialError::NotFound { guid } | CredentialError::Corrupted { guid } => {
                serde_json::json!({"guid": guid})
            }
            CredentialError::UnknownVersion { version } => {
                serde_json::json!({"version": version})
            }
            CredentialError::UrlCollision { name, url }
            | CredentialError::NameCollision { name, url }
            | CredentialError::EnvUrlCollision { name, url }
            | CredentialError::EnvNameCollision { name, url } => {
                serde_json::json!({"name": name, "url": url})
            }
            _ => serde_json::Value::Null,
        }
    }
}
