//! Settings-store contract shared with the settings UI.
//!
//! The store is a key-value surface with `get`/`set` semantics matching a
//! browser extension's synced storage: `get` returns a partial record
//! holding only the requested keys that exist, `set` merges the given
//! record into what is already stored. The guard engine only ever reads;
//! the settings UI owns all writes.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::policy::PolicyMap;

/// Recognized settings keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingsKey {
    /// Account email for API authentication.
    CredentialEmail,
    /// API token for authentication.
    CredentialToken,
    /// Per-repository allowed-destination policy map.
    PolicyMap,
}

/// A partial settings record: absent fields were not requested or not set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    /// Account email, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_email: Option<String>,
    /// API token, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_token: Option<String>,
    /// Policy map, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_map: Option<PolicyMap>,
}

/// Errors from the settings store.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The underlying storage could not be reached or was corrupt.
    #[error("settings storage failed: {0}")]
    Storage(String),
}

/// Key-value settings storage.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the requested keys; missing keys are simply absent from the
    /// returned record.
    async fn get(&self, keys: &[SettingsKey]) -> Result<SettingsRecord, SettingsError>;

    /// Merge the given record into storage. `None` fields are left as-is.
    async fn set(&self, record: SettingsRecord) -> Result<(), SettingsError>;
}

/// In-memory [`SettingsStore`] used by tests and non-persistent embeddings.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    record: Mutex<SettingsRecord>,
}

impl MemorySettingsStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a record.
    pub fn with_record(record: SettingsRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, keys: &[SettingsKey]) -> Result<SettingsRecord, SettingsError> {
        let stored = self
            .record
            .lock()
            .map_err(|e| SettingsError::Storage(format!("lock poisoned: {e}")))?;

        let mut out = SettingsRecord::default();
        for key in keys {
            match key {
                SettingsKey::CredentialEmail => {
                    out.credential_email.clone_from(&stored.credential_email);
                }
                SettingsKey::CredentialToken => {
                    out.credential_token.clone_from(&stored.credential_token);
                }
                SettingsKey::PolicyMap => out.policy_map.clone_from(&stored.policy_map),
            }
        }
        Ok(out)
    }

    async fn set(&self, record: SettingsRecord) -> Result<(), SettingsError> {
        let mut stored = self
            .record
            .lock()
            .map_err(|e| SettingsError::Storage(format!("lock poisoned: {e}")))?;

        if record.credential_email.is_some() {
            stored.credential_email = record.credential_email;
        }
        if record.credential_token.is_some() {
            stored.credential_token = record.credential_token;
        }
        if record.policy_map.is_some() {
            stored.policy_map = record.policy_map;
        }
        Ok(())
    }
}
