//! Authenticated encryption for values written to the local store.
//!
//! Values are sealed with ChaCha20-Poly1305 under a 32-byte key derived from
//! the configured passphrase with HKDF-SHA256. The stored form is
//! `base64(nonce || ciphertext)`.

use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
pub const STORE_NONCE_SIZE: usize = 12;
/// Key size for ChaCha20-Poly1305 (256 bits).
pub const STORE_KEY_SIZE: usize = 32;

const KDF_SALT: &[u8] = b"leaguer-store-v1";
const KDF_INFO: &[u8] = b"leaguer secure store";

/// Errors returned by the store cipher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreCryptoError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("base64 decode failed: {0}")]
    Base64Decode(String),
    #[error("sealed value too short: {0} bytes")]
    TooShort(usize),
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed")]
    Decrypt,
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Process-wide cipher for store values.
#[derive(Clone)]
pub struct StoreCipher {
    key: [u8; STORE_KEY_SIZE],
}

impl fmt::Debug for StoreCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCipher").finish_non_exhaustive()
    }
}

impl StoreCipher {
    /// Derive the store key from a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, StoreCryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), passphrase.as_bytes());
        let mut key = [0u8; STORE_KEY_SIZE];
        hk.expand(KDF_INFO, &mut key)
            .map_err(|_| StoreCryptoError::KeyDerivation)?;
        Ok(Self { key })
    }

    /// Build a cipher from raw key bytes.
    pub fn from_key(key: [u8; STORE_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Seal a plaintext value with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, StoreCryptoError> {
        let mut nonce = [0u8; STORE_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.encrypt_with_nonce(&nonce, plaintext)
    }

    /// Seal with a caller-provided nonce. Only for deterministic tests.
    pub fn encrypt_with_nonce(
        &self,
        nonce: &[u8; STORE_NONCE_SIZE],
        plaintext: &str,
    ) -> Result<String, StoreCryptoError> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| StoreCryptoError::Encrypt(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
            .map_err(|e| StoreCryptoError::Encrypt(e.to_string()))?;

        let mut sealed = Vec::with_capacity(STORE_NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Open a sealed value.
    pub fn decrypt(&self, sealed: &str) -> Result<String, StoreCryptoError> {
        let bytes = BASE64
            .decode(sealed.trim())
            .map_err(|e| StoreCryptoError::Base64Decode(e.to_string()))?;

        // Poly1305 tag is 16 bytes; anything shorter cannot be ours.
        if bytes.len() < STORE_NONCE_SIZE + 16 {
            return Err(StoreCryptoError::TooShort(bytes.len()));
        }

        let (nonce, ciphertext) = bytes.split_at(STORE_NONCE_SIZE);
        let cipher =
            ChaCha20Poly1305::new_from_slice(&self.key).map_err(|_| StoreCryptoError::Decrypt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreCryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| StoreCryptoError::InvalidUtf8)
    }
}
