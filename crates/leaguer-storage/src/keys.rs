//! Storage key constants.

/// Prefix applied to every key written through the encrypted store.
pub const NAMESPACE_PREFIX: &str = "secure_";

/// Storage keys used by the client.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token (encrypted store)
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token (encrypted store)
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Cached user record as JSON (encrypted store)
    pub const USER: &'static str = "user";

    /// Device identifier (raw durable backend, not namespaced)
    pub const DEVICE_ID: &'static str = "device_id";

    /// Keys that make up a session and are wiped on logout.
    pub const SESSION_KEYS: [&'static str; 3] =
        [Self::ACCESS_TOKEN, Self::REFRESH_TOKEN, Self::USER];
}

/// Namespaced form of `key` as it lands in a backend.
pub fn namespaced(key: &str) -> String {
    format!("{}{}", NAMESPACE_PREFIX, key)
}
