//! Expiring storage for the bearer credentials.
//!
//! Expiry is enforced here and nowhere else: once an entry's `expires_at`
//! has passed, `get` reports it absent. A storage medium that fails is also
//! reported absent, which degrades the session to logged-out instead of
//! failing the caller.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Keychain service name
const SERVICE_NAME: &str = "duels";

/// Prefix applied to every credential name
const NAMESPACE: &str = "duels::";

pub trait CredentialStore: Send + Sync {
    /// Returns the value if present and unexpired.
    fn get(&self, name: &str) -> Option<String>;

    /// Stores `value`, readable until `expires_at`.
    fn set(&self, name: &str, value: &str, expires_at: DateTime<Utc>);

    fn remove(&self, name: &str);
}

/// Stored form of a credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

fn namespaced(name: &str) -> String {
    format!("{}{}", NAMESPACE, name)
}

/// Credentials kept in the OS keychain.
///
/// Keychain items are private to the current user, so other processes and
/// origins cannot read them.
#[derive(Debug, Default, Clone)]
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(name: &str) -> Option<Entry> {
        match Entry::new(SERVICE_NAME, &namespaced(name)) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, name, "Failed to create keyring entry");
                None
            }
        }
    }

    /// Whether the keychain can be reached at all.
    pub fn is_available(&self) -> bool {
        let Some(entry) = Self::entry("availability") else {
            return false;
        };
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::BadEncoding(_)) | Err(keyring::Error::Ambiguous(_)) => true,
            Err(_) => false,
        }
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, name: &str) -> Option<String> {
        let entry = Self::entry(name)?;
        let raw = match entry.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return None,
            Err(e) => {
                warn!(error = %e, name, "Failed to read credential from keychain");
                return None;
            }
        };

        let stored: StoredEntry = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, name, "Discarding unreadable keychain entry");
                let _ = entry.delete_credential();
                return None;
            }
        };

        if stored.is_expired() {
            debug!(name, "Credential expired");
            let _ = entry.delete_credential();
            return None;
        }
        Some(stored.value)
    }

    fn set(&self, name: &str, value: &str, expires_at: DateTime<Utc>) {
        let Some(entry) = Self::entry(name) else {
            return;
        };
        let stored = StoredEntry {
            value: value.to_string(),
            expires_at,
        };
        let raw = match serde_json::to_string(&stored) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, name, "Failed to encode credential");
                return;
            }
        };
        if let Err(e) = entry.set_password(&raw) {
            warn!(error = %e, name, "Failed to store credential in keychain");
        }
    }

    fn remove(&self, name: &str) {
        let Some(entry) = Self::entry(name) else {
            return;
        };
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, name, "Failed to delete credential from keychain"),
        }
    }
}

/// Process-local credentials. Used when no keychain is available and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, name: &str) -> Option<String> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        let key = namespaced(name);
        match entries.get(&key) {
            Some(stored) if stored.is_expired() => {
                entries.remove(&key);
                None
            }
            Some(stored) => Some(stored.value.clone()),
            None => None,
        }
    }

    fn set(&self, name: &str, value: &str, expires_at: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                namespaced(name),
                StoredEntry {
                    value: value.to_string(),
                    expires_at,
                },
            );
        }
    }

    fn remove(&self, name: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&namespaced(name));
        }
    }
}
