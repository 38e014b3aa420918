//! The credential service: load/merge/save over the secure store.

use std::sync::Arc;

use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::record::{Credential, CredentialRecord, CredentialTable, ENV_GUID};
use crate::store::SecretStore;
use crate::url_util::normalize_server_url;
use crate::CredentialError;

/// Service name used in the platform secure store.
pub const SERVICE_NAME: &str = "Podium Safe Storage";

/// Key under which the whole credential table is stored.
pub const STORE_KEY: &str = "credentials";

/// Environment variable naming the server URL for the ephemeral credential.
pub const ENV_URL_VAR: &str = "PODIUM_SERVER";

/// Environment variable carrying the API key for the ephemeral credential.
pub const ENV_KEY_VAR: &str = "PODIUM_API_KEY";

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Manages named server credentials.
///
/// Every load merges in a credential synthesized from [`ENV_URL_VAR`] and
/// [`ENV_KEY_VAR`] under the reserved [`ENV_GUID`]; every save strips it
/// so it is never persisted.
pub struct CredentialsService {
    store: Arc<dyn SecretStore>,
    env: Box<EnvLookup>,
}

impl CredentialsService {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            env: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replaces the environment lookup, for tests.
    pub fn with_env(
        store: Arc<dyn SecretStore>,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            env: Box::new(env),
        }
    }

    /// Creates a credential with a fresh GUID. Fails if the normalized
    /// URL or the name collides with an existing credential; collisions
    /// with the environment credential use distinct codes so callers can
    /// explain where the conflicting value comes from.
    pub fn set(
        &self,
        name: &str,
        url: &str,
        api_key: &str,
    ) -> Result<Credential, CredentialError> {
        let mut table = self.load()?;
        let normalized = normalize_server_url(url)?;

        for record in table.values() {
            let existing = match record.to_credential() {
                Ok(cred) => cred,
                Err(_) => {
                    return Err(CredentialError::Corrupted {
                        guid: record.guid.clone(),
                    })
                }
            };
            if existing.url.eq_ignore_ascii_case(&normalized) {
                if existing.guid == ENV_GUID {
                    return Err(CredentialError::EnvUrlCollision {
                        name: name.to_string(),
                        url: normalized,
                    });
                }
                return Err(CredentialError::UrlCollision {
                    name: name.to_string(),
                    url: normalized,
                });
            }
            if existing.name == name {
                if existing.guid == ENV_GUID {
                    return Err(CredentialError::EnvNameCollision {
                        name: name.to_string(),
                        url: normalized,
                    });
                }
                return Err(CredentialError::NameCollision {
                    name: name.to_string(),
                    url: normalized,
                });
            }
        }

        let credential = Credential {
            guid: Uuid::new_v4().to_string(),
            name: name.to_string(),
            url: normalized,
            api_key: api_key.to_string(),
        };
        table.insert(
            credential.guid.clone(),
            CredentialRecord::from_credential(&credential)?,
        );
        self.save(table)?;
        debug!(name, "credential stored");
        Ok(credential)
    }

    pub fn get(&self, guid: &str) -> Result<Credential, CredentialError> {
        let table = self.load()?;
        let record = table.get(guid).ok_or_else(|| CredentialError::NotFound {
            guid: guid.to_string(),
        })?;
        record.to_credential()
    }

    /// Removes a credential. The environment credential is rejected
    /// unconditionally: it exists only as long as the variables do.
    pub fn delete(&self, guid: &str) -> Result<(), CredentialError> {
        let mut table = self.load()?;
        if !table.contains_key(guid) {
            return Err(CredentialError::NotFound {
                guid: guid.to_string(),
            });
        }
        if guid == ENV_GUID {
            return Err(CredentialError::EnvDelete);
        }
        table.remove(guid);
        self.save(table)
    }

    /// All credentials, sorted by name.
    pub fn list(&self) -> Result<Vec<Credential>, CredentialError> {
        let table = self.load()?;
        let mut credentials = table
            .values()
            .map(CredentialRecord::to_credential)
            .collect::<Result<Vec<_>, _>>()?;
        credentials.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(credentials)
    }

    /// Synthesizes the environment credential, if both variables are set.
    fn env_record(&self) -> Result<Option<CredentialRecord>, CredentialError> {
        let (Some(url), Some(api_key)) = ((self.env)(ENV_URL_VAR), (self.env)(ENV_KEY_VAR))
        else {
            return Ok(None);
        };
        if url.is_empty() || api_key.is_empty() {
            return Ok(None);
        }
        let normalized = normalize_server_url(&url)?;
        let name = match Url::parse(&normalized)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        {
            Some(host) => format!("Env: {host}"),
            None => format!("Env: {normalized}"),
        };
        let credential = Credential {
            guid: ENV_GUID.to_string(),
            name,
            url: normalized,
            api_key,
        };
        Ok(Some(CredentialRecord::from_credential(&credential)?))
    }

    fn load(&self) -> Result<CredentialTable, CredentialError> {
        let mut table = match self.store.get(SERVICE_NAME, STORE_KEY)? {
            Some(blob) => serde_json::from_str(&blob)?,
            None => CredentialTable::new(),
        };
        if let Some(record) = self.env_record()? {
            table.insert(ENV_GUID.to_string(), record);
        }
        Ok(table)
    }

    fn save(&self, mut table: CredentialTable) -> Result<(), CredentialError> {
        // The environment credential lives in the environment, not here.
        table.remove(ENV_GUID);
        let blob = serde_json::to_string(&table)?;
        self.store.set(SERVICE_NAME, STORE_KEY, &blob)
    }
}
