//! Credential storage backed by the operating system keyring.
//!
//! Tokens are written under a fixed service name and an opaque account key
//! of the form `<prefix>-<uuid>`. Callers persist only the key; the secret
//! itself never touches the config file.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

/// Service name used for every keyring entry written by the CLI.
pub const KEYRING_SERVICE: &str = "doppler-cli";

/// Errors surfaced by keyring operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    /// The keyring is reachable but holds no entry for the key.
    #[error("no keyring entry for {0}")]
    NotFound(String),
    /// The platform keyring failed (locked, unavailable, denied).
    #[error("keyring error: {0}")]
    Backend(String),
}

impl From<keyring::Error> for CredentialStoreError {
    fn from(err: keyring::Error) -> Self {
        CredentialStoreError::Backend(err.to_string())
    }
}

/// Minimal keyring surface used by the configuration store.
///
/// Implementations must be safe to share; the CLI accesses the keyring
/// serially but holds the store behind an `Arc`.
pub trait KeyringStore: fmt::Debug + Send + Sync {
    fn load(&self, service: &str, account: &str) -> Result<String, CredentialStoreError>;
    fn save(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialStoreError>;
    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialStoreError>;
}

/// Keyring implementation that talks to the platform credential store.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyringStore;

impl KeyringStore for DefaultKeyringStore {
    fn load(&self, service: &str, account: &str) -> Result<String, CredentialStoreError> {
        tracing::debug!("keyring.load start, service={service}, account={account}");
        let entry = keyring::Entry::new(service, account)?;
        match entry.get_password() {
            Ok(password) => Ok(password),
            Err(keyring::Error::NoEntry) => {
                Err(CredentialStoreError::NotFound(account.to_string()))
            }
            Err(err) => {
                tracing::debug!("keyring.load error, account={account}, error={err}");
                Err(err.into())
            }
        }
    }

    fn save(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialStoreError> {
        tracing::debug!("keyring.save start, service={service}, account={account}");
        let entry = keyring::Entry::new(service, account)?;
        entry.set_password(value)?;
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialStoreError> {
        tracing::debug!("keyring.delete start, service={service}, account={account}");
        let entry = keyring::Entry::new(service, account)?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory keyring for tests and for environments without a session bus.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyringStore {
    entries: Arc<Mutex<HashMap<(String, String), String>>>,
    broken: bool,
}

impl MemoryKeyringStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails, simulating a locked keyring.
    pub fn unavailable() -> Self {
        Self {
            entries: Arc::default(),
            broken: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), CredentialStoreError> {
        if self.broken {
            return Err(CredentialStoreError::Backend(
                "keyring unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl KeyringStore for MemoryKeyringStore {
    fn load(&self, service: &str, account: &str) -> Result<String, CredentialStoreError> {
        self.check()?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| CredentialStoreError::Backend("lock poisoned".to_string()))?;
        entries
            .get(&(service.to_string(), account.to_string()))
            .cloned()
            .ok_or_else(|| CredentialStoreError::NotFound(account.to_string()))
    }

    fn save(&self, service: &str, account: &str, value: &str) -> Result<(), CredentialStoreError> {
        self.check()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CredentialStoreError::Backend("lock poisoned".to_string()))?;
        entries.insert(
            (service.to_string(), account.to_string()),
            value.to_string(),
        );
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialStoreError> {
        self.check()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CredentialStoreError::Backend("lock poisoned".to_string()))?;
        Ok(entries
            .remove(&(service.to_string(), account.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_store_round_trips_and_deletes() {
        let store = MemoryKeyringStore::new();
        store.save(KEYRING_SERVICE, "key-1", "secret").unwrap();
        assert_eq!(store.load(KEYRING_SERVICE, "key-1").unwrap(), "secret");
        assert!(store.delete(KEYRING_SERVICE, "key-1").unwrap());
        assert!(!store.delete(KEYRING_SERVICE, "key-1").unwrap());
        assert!(matches!(
            store.load(KEYRING_SERVICE, "key-1"),
            Err(CredentialStoreError::NotFound(_))
        ));
    }

    #[test]
    fn clones_share_entries() {
        let store = MemoryKeyringStore::new();
        let other = store.clone();
        store.save(KEYRING_SERVICE, "k", "v").unwrap();
        assert_eq!(other.load(KEYRING_SERVICE, "k").unwrap(), "v");
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn unavailable_store_fails_every_call() {
        let store = MemoryKeyringStore::unavailable();
        assert!(matches!(
            store.save(KEYRING_SERVICE, "k", "v"),
            Err(CredentialStoreError::Backend(_))
        ));
        assert!(store.load(KEYRING_SERVICE, "k").is_err());
        assert!(store.delete(KEYRING_SERVICE, "k").is_err());
    }

    #[test]
    fn errors_name_the_missing_key() {
        let err = MemoryKeyringStore::new()
            .load(KEYRING_SERVICE, "token-1")
            .unwrap_err();
        assert_eq!(err.to_string(), "no keyring entry for token-1");
        assert_eq!(
            CredentialStoreError::Backend("locked".to_string()).to_string(),
            "keyring error: locked"
        );
    }
}
