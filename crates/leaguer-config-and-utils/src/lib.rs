//! Core types, configuration, and utilities for the Leaguer client.
//!
//! This crate provides:
//! - `Config` with compile-time defaults and environment overrides
//! - `Paths` for everything stored under `~/.leaguer`
//! - Logging initialization on top of the `observability` package
//! - The authenticated cipher used by the encrypted store

mod config;
mod error;
mod logging;
mod paths;
pub mod store_crypto;

pub use config::{
    Config, SocialProviders, DEFAULT_BACKEND_URL, DEFAULT_ENCRYPTION_KEY, DEFAULT_LANGUAGE,
    DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WS_HOST, DEFAULT_WS_PORT,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging_for_service;
pub use paths::Paths;
pub use store_crypto::{StoreCipher, StoreCryptoError};
