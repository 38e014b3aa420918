//! The secure blob store seam.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::CredentialError;

/// A platform-provided secure key-value store. One service/key pair holds
/// the entire serialized credential table.
pub trait SecretStore: Send + Sync {
    /// Returns the stored value, or `None` if nothing is stored yet.
    fn get(&self, service: &str, key: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, service: &str, key: &str, value: &str) -> Result<(), CredentialError>;
}

/// The OS keyring (Keychain, Secret Service, Windows Credential Manager).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl SecretStore for KeyringStore {
    fn get(&self, service: &str, key: &str) -> Result<Option<String>, CredentialError> {
        let entry = keyring::Entry::new(service, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, service: &str, key: &str, value: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(service, key)?;
        entry.set_password(value)?;
        Ok(())
    }
}

/// In-memory store for tests and headless environments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, service: &str, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&(service.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, key: &str, value: &str) -> Result<(), CredentialError> {
        self.values
            .lock()
            .unwrap()
            .insert((service.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}
