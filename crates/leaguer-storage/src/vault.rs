//! High-level API for the session's credentials and cached user.

use crate::{CachedUser, EncryptedStore, StorageKeys, StorageResult, StorageTier, TokenLocation, TokenPair};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Credentials as found in the store, tagged with where they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub location: TokenLocation,
    pub access_token: String,
    /// Absent when only an access token was persisted.
    pub refresh_token: Option<String>,
    /// Vault epoch at the time the session was read.
    pub epoch: u64,
}

/// Session-level view over the encrypted store.
///
/// Credentials and the cached user always live together in one tier. Writing
/// them to a tier removes any copy from the other tier.
///
/// Every write or clear of the credentials bumps an epoch shared by all
/// clones. [`SessionVault::rotate_tokens`] only writes while the epoch it was
/// given is still current.
#[derive(Clone)]
pub struct SessionVault {
    store: Arc<EncryptedStore>,
    epoch: Arc<Mutex<u64>>,
}

impl SessionVault {
    pub fn new(store: Arc<EncryptedStore>) -> Self {
        Self {
            store,
            epoch: Arc::new(Mutex::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<EncryptedStore> {
        &self.store
    }

    // ==========================================
    // Credentials
    // ==========================================

    /// Find the active session, probing the ephemeral tier first.
    pub fn locate_session(&self) -> Option<StoredSession> {
        let epoch = self.epoch.lock();
        StorageTier::PROBE_ORDER.iter().find_map(|tier| {
            let access_token = self.store.get(*tier, StorageKeys::ACCESS_TOKEN)?;
            Some(StoredSession {
                location: *tier,
                access_token,
                refresh_token: self.store.get(*tier, StorageKeys::REFRESH_TOKEN),
                epoch: *epoch,
            })
        })
    }

    /// The tier holding the current access token, if any.
    pub fn token_location(&self) -> Option<TokenLocation> {
        self.locate_session().map(|session| session.location)
    }

    pub fn access_token(&self) -> Option<String> {
        self.locate_session().map(|session| session.access_token)
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token().is_some()
    }

    /// Store a token pair in `tier` and drop any credentials in the other tier.
    pub fn write_tokens(&self, tier: StorageTier, pair: &TokenPair) -> StorageResult<()> {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.put_tokens(tier, pair)
    }

    /// Replace the tokens of `session` in its tier, unless the session was
    /// replaced or cleared after it was read.
    ///
    /// Returns `false` when the write was refused.
    pub fn rotate_tokens(&self, session: &StoredSession, pair: &TokenPair) -> StorageResult<bool> {
        let epoch = self.epoch.lock();
        if *epoch != session.epoch {
            debug!(
                read_at = session.epoch,
                current = *epoch,
                "Session changed since it was read, dropping rotated tokens"
            );
            return Ok(false);
        }
        self.put_tokens(session.location, pair)?;
        Ok(true)
    }

    fn put_tokens(&self, tier: StorageTier, pair: &TokenPair) -> StorageResult<()> {
        self.store.set(tier, StorageKeys::ACCESS_TOKEN, &pair.access_token)?;
        self.store.set(tier, StorageKeys::REFRESH_TOKEN, &pair.refresh_token)?;
        self.remove_from(
            tier.other(),
            &[StorageKeys::ACCESS_TOKEN, StorageKeys::REFRESH_TOKEN],
        )?;
        debug!(?tier, "Stored session tokens");
        Ok(())
    }

    /// Remove credentials from both tiers.
    pub fn clear_tokens(&self) -> StorageResult<()> {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.remove_everywhere(&[StorageKeys::ACCESS_TOKEN, StorageKeys::REFRESH_TOKEN])
    }

    // ==========================================
    // Cached user
    // ==========================================

    /// The cached user, ephemeral tier first. An unreadable record reads as `None`.
    pub fn read_user(&self) -> Option<CachedUser> {
        StorageTier::PROBE_ORDER.iter().find_map(|tier| {
            let raw = self.store.get(*tier, StorageKeys::USER)?;
            match serde_json::from_str(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(?tier, error = %e, "Ignoring unreadable cached user");
                    None
                }
            }
        })
    }

    pub fn user_id(&self) -> Option<String> {
        self.read_user().map(|user| user.id)
    }

    /// Replace the cached user in `tier` and drop any copy from the other tier.
    pub fn write_user(&self, tier: StorageTier, user: &CachedUser) -> StorageResult<()> {
        let raw = serde_json::to_string(user)?;
        self.store.set(tier, StorageKeys::USER, &raw)?;
        self.remove_from(tier.other(), &[StorageKeys::USER])?;
        Ok(())
    }

    pub fn clear_user(&self) -> StorageResult<()> {
        self.remove_everywhere(&[StorageKeys::USER])
    }

    /// Remove credentials and the cached user from both tiers.
    pub fn clear_session(&self) -> StorageResult<()> {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.remove_everywhere(&StorageKeys::SESSION_KEYS)
    }

    fn remove_from(&self, tier: StorageTier, keys: &[&str]) -> StorageResult<()> {
        for key in keys {
            self.store.remove(tier, key)?;
        }
        Ok(())
    }

    /// Attempts every removal even if one fails, then reports the first error.
    fn remove_everywhere(&self, keys: &[&str]) -> StorageResult<()> {
        let mut first_error = None;
        for tier in StorageTier::PROBE_ORDER {
            for key in keys {
                if let Err(e) = self.store.remove(tier, key) {
                    warn!(?tier, key, error = %e, "Failed to remove stored value");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
