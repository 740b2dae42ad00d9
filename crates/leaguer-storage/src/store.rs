//! Encrypted two-tier store.

use crate::keys::{namespaced, NAMESPACE_PREFIX};
use crate::{KeyValueBackend, StorageResult};
use leaguer_config_and_utils::StoreCipher;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persistence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Survives restarts.
    Durable,
    /// Lives as long as the process.
    Ephemeral,
}

/// The tier currently holding the session's credentials.
pub type TokenLocation = StorageTier;

impl StorageTier {
    /// The tier a session lands in for a given "remember me" choice.
    pub fn for_remember_me(remember_me: bool) -> Self {
        if remember_me {
            StorageTier::Durable
        } else {
            StorageTier::Ephemeral
        }
    }

    pub fn other(self) -> Self {
        match self {
            StorageTier::Durable => StorageTier::Ephemeral,
            StorageTier::Ephemeral => StorageTier::Durable,
        }
    }

    /// Lookup order for credentials: ephemeral first.
    pub const PROBE_ORDER: [StorageTier; 2] = [StorageTier::Ephemeral, StorageTier::Durable];
}

/// Encrypting wrapper over a durable and an ephemeral backend.
///
/// Every value is sealed with the process-wide [`StoreCipher`] and every key is
/// prefixed with `secure_`. Reads never fail: a missing backend entry, a backend
/// error or a value that does not decrypt all read as `None`.
pub struct EncryptedStore {
    durable: Arc<dyn KeyValueBackend>,
    ephemeral: Arc<dyn KeyValueBackend>,
    cipher: StoreCipher,
}

impl EncryptedStore {
    pub fn new(
        durable: Arc<dyn KeyValueBackend>,
        ephemeral: Arc<dyn KeyValueBackend>,
        cipher: StoreCipher,
    ) -> Self {
        Self {
            durable,
            ephemeral,
            cipher,
        }
    }

    /// The raw backend for a tier.
    pub fn backend(&self, tier: StorageTier) -> &Arc<dyn KeyValueBackend> {
        match tier {
            StorageTier::Durable => &self.durable,
            StorageTier::Ephemeral => &self.ephemeral,
        }
    }

    /// Encrypt and store `value` under `key` in `tier`.
    pub fn set(&self, tier: StorageTier, key: &str, value: &str) -> StorageResult<()> {
        let sealed = self.cipher.encrypt(value)?;
        self.backend(tier).set(&namespaced(key), &sealed)
    }

    /// Read and decrypt `key` from `tier`.
    pub fn get(&self, tier: StorageTier, key: &str) -> Option<String> {
        let sealed = match self.backend(tier).get(&namespaced(key)) {
            Ok(Some(sealed)) => sealed,
            Ok(None) => return None,
            Err(e) => {
                warn!(?tier, key, error = %e, "Store read failed");
                return None;
            }
        };

        match self.cipher.decrypt(&sealed) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(?tier, key, error = %e, "Discarding value that failed to decrypt");
                None
            }
        }
    }

    /// Remove `key` from `tier`. Returns whether it existed.
    pub fn remove(&self, tier: StorageTier, key: &str) -> StorageResult<bool> {
        self.backend(tier).delete(&namespaced(key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set(StorageTier::Durable, key, value)
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.get(StorageTier::Durable, key)
    }

    pub fn remove_item(&self, key: &str) -> StorageResult<bool> {
        self.remove(StorageTier::Durable, key)
    }

    pub fn set_session_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set(StorageTier::Ephemeral, key, value)
    }

    pub fn get_session_item(&self, key: &str) -> Option<String> {
        self.get(StorageTier::Ephemeral, key)
    }

    pub fn remove_session_item(&self, key: &str) -> StorageResult<bool> {
        self.remove(StorageTier::Ephemeral, key)
    }

    /// Whether `key` is present in either tier (without decrypting it).
    pub fn exists(&self, key: &str) -> bool {
        let key = namespaced(key);
        StorageTier::PROBE_ORDER
            .iter()
            .any(|tier| self.backend(*tier).has(&key).unwrap_or(false))
    }

    /// Remove every namespaced key from the durable tier.
    pub fn clear(&self) -> StorageResult<usize> {
        self.clear_tier(StorageTier::Durable)
    }

    /// Remove every namespaced key from the ephemeral tier.
    pub fn clear_session(&self) -> StorageResult<usize> {
        self.clear_tier(StorageTier::Ephemeral)
    }

    fn clear_tier(&self, tier: StorageTier) -> StorageResult<usize> {
        let backend = self.backend(tier);
        let mut removed = 0;
        for key in backend.list_keys_with_prefix(NAMESPACE_PREFIX)? {
            if backend.delete(&key)? {
                removed += 1;
            }
        }
        debug!(?tier, removed, "Cleared store tier");
        Ok(removed)
    }
}
