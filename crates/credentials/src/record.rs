//! Versioned credential records.
//!
//! Migration path for schema changes: freeze the current [`Credential`]
//! shape as `CredentialV<n>`, bump [`CURRENT_VERSION`], add a decoder arm
//! in [`CredentialRecord::to_credential`]. Unknown versions fail loudly —
//! guessing at a future schema corrupts silently.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::CredentialError;

/// The only record version currently defined.
pub const CURRENT_VERSION: u32 = 0;

/// Reserved GUID for the environment-variable credential. Never persisted.
pub const ENV_GUID: &str = "00000000-0000-0000-0000-000000000000";

/// A stored server credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub guid: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

type CredentialV0 = Credential;

/// Storage envelope: the payload stays opaque until the version is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub guid: String,
    pub version: u32,
    pub data: Box<RawValue>,
}

/// The persisted table, keyed by GUID.
pub type CredentialTable = HashMap<String, CredentialRecord>;

impl CredentialRecord {
    /// Wraps a credential at the current version.
    pub fn from_credential(credential: &Credential) -> Result<Self, CredentialError> {
        let raw = serde_json::to_string(credential)?;
        Ok(Self {
            guid: credential.guid.clone(),
            version: CURRENT_VERSION,
            data: RawValue::from_string(raw)?,
        })
    }

    /// Decodes the payload according to its version.
    pub fn to_credential(&self) -> Result<Credential, CredentialError> {
        match self.version {
            0 => serde_json::from_str::<CredentialV0>(self.data.get()).map_err(|_| {
                CredentialError::Corrupted {
                    guid: self.guid.clone(),
                }
            }),
            version => Err(CredentialError::UnknownVersion { version }),
        }
    }
}
