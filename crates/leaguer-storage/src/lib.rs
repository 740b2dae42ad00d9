//! Local storage for the Leaguer client.
//!
//! This crate provides:
//! - The `KeyValueBackend` trait with file-backed (durable) and in-memory
//!   (ephemeral) implementations
//! - `EncryptedStore`, which seals every value and namespaces every key
//! - `SessionVault`, the credential and cached-user API used by the gateway,
//!   the live channel and the orchestrator

mod file;
mod keys;
mod memory;
mod store;
mod traits;
mod user;
mod vault;

pub use file::FileBackend;
pub use keys::{namespaced, StorageKeys, NAMESPACE_PREFIX};
pub use memory::MemoryBackend;
pub use store::{EncryptedStore, StorageTier, TokenLocation};
pub use traits::KeyValueBackend;
pub use user::{CachedUser, TokenPair};
pub use vault::{SessionVault, StoredSession};

use leaguer_config_and_utils::{Config, Paths, StoreCipher, StoreCryptoError};
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encryption failure on write
    #[error("Encryption error: {0}")]
    Crypto(#[from] StoreCryptoError),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Open the default store: `~/.leaguer/store.json` for the durable tier and a
/// fresh in-memory map for the ephemeral tier.
pub fn open_default_store(config: &Config, paths: &Paths) -> StorageResult<EncryptedStore> {
    let durable = FileBackend::open(paths.durable_store_file())?;
    let cipher = StoreCipher::from_passphrase(&config.encryption_key)?;
    Ok(EncryptedStore::new(
        Arc::new(durable),
        Arc::new(MemoryBackend::new()),
        cipher,
    ))
}
