//! Configuration management for the Leaguer client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend URL (can be overridden at compile time via LEAGUER_BACKEND_URL).
pub const DEFAULT_BACKEND_URL: &str = match option_env!("LEAGUER_BACKEND_URL") {
    Some(url) => url,
    None => "http://localhost:8000",
};

/// Default live channel host.
pub const DEFAULT_WS_HOST: &str = match option_env!("LEAGUER_WS_HOST") {
    Some(host) => host,
    None => "localhost",
};

/// Default live channel port.
pub const DEFAULT_WS_PORT: u16 = 9000;

/// Default store passphrase (can be overridden at compile time via LEAGUER_ENCRYPTION_KEY).
pub const DEFAULT_ENCRYPTION_KEY: &str = match option_env!("LEAGUER_ENCRYPTION_KEY") {
    Some(key) => key,
    None => "leaguer-default-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default language sent as `selected_language`.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Which third-party sign-in providers are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProviders {
    #[serde(default = "enabled")]
    pub google: bool,
    #[serde(default = "enabled")]
    pub facebook: bool,
    #[serde(default = "enabled")]
    pub apple: bool,
}

fn enabled() -> bool {
    true
}

impl Default for SocialProviders {
    fn default() -> Self {
        Self {
            google: true,
            facebook: true,
            apple: true,
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the HTTP backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Explicit live channel base URL. When unset, built from host and port.
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "default_ws_host")]
    pub ws_host: String,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// Passphrase the store encryption key is derived from.
    #[serde(default = "default_encryption_key")]
    pub encryption_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Language code sent with auth requests.
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub social_providers: SocialProviders,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_ws_host() -> String {
    DEFAULT_WS_HOST.to_string()
}

fn default_ws_port() -> u16 {
    DEFAULT_WS_PORT
}

fn default_encryption_key() -> String {
    DEFAULT_ENCRYPTION_KEY.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            backend_url: default_backend_url(),
            ws_url: None,
            ws_host: default_ws_host(),
            ws_port: DEFAULT_WS_PORT,
            encryption_key: default_encryption_key(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            language: default_language(),
            social_providers: SocialProviders::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config file (if present), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `LEAGUER_*` overrides from the given lookup.
    ///
    /// Unparseable numeric or boolean values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = get("LEAGUER_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("LEAGUER_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(url) = get("LEAGUER_WS_URL") {
            self.ws_url = Some(url);
        }
        if let Some(host) = get("LEAGUER_WS_HOST") {
            self.ws_host = host;
        }
        if let Some(port) = get("LEAGUER_WS_PORT") {
            match port.parse() {
                Ok(port) => self.ws_port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid LEAGUER_WS_PORT"),
            }
        }
        if let Some(key) = get("LEAGUER_ENCRYPTION_KEY") {
            self.encryption_key = key;
        }
        if let Some(secs) = get("LEAGUER_REQUEST_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => {
                    tracing::warn!(value = %secs, "Ignoring invalid LEAGUER_REQUEST_TIMEOUT_SECS")
                }
            }
        }
        if let Some(language) = get("LEAGUER_LANGUAGE") {
            self.language = language;
        }

        let flags = [
            ("LEAGUER_ENABLE_GOOGLE_LOGIN", &mut self.social_providers.google),
            ("LEAGUER_ENABLE_FACEBOOK_LOGIN", &mut self.social_providers.facebook),
            ("LEAGUER_ENABLE_APPLE_LOGIN", &mut self.social_providers.apple),
        ];
        for (name, slot) in flags {
            if let Some(raw) = get(name) {
                match parse_flag(&raw) {
                    Some(value) => *slot = value,
                    None => tracing::warn!(name, value = %raw, "Ignoring invalid boolean flag"),
                }
            }
        }
    }

    /// The backend base URL, parsed.
    pub fn backend_url(&self) -> CoreResult<Url> {
        Url::parse(&self.backend_url).map_err(CoreError::from)
    }

    /// The live channel base URL: `ws_url` if set, otherwise `ws://host:port`.
    pub fn ws_url(&self) -> CoreResult<Url> {
        let raw = match &self.ws_url {
            Some(url) => url.clone(),
            None => format!("ws://{}:{}", self.ws_host, self.ws_port),
        };
        Url::parse(&raw).map_err(CoreError::from)
    }

    /// The HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.encryption_key, DEFAULT_ENCRYPTION_KEY);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.language, "en");
        assert!(config.social_providers.google);
    }

    #[test]
    fn test_ws_url_from_host_and_port() {
        let mut config = Config::default();
        config.ws_host = "live.example.com".to_string();
        config.ws_port = 9443;

        let url = config.ws_url().unwrap();
        assert_eq!(url.as_str(), "ws://live.example.com:9443/");
    }

    #[test]
    fn test_explicit_ws_url_wins() {
        let mut config = Config::default();
        config.ws_url = Some("wss://live.leaguer.app".to_string());

        assert_eq!(config.ws_url().unwrap().scheme(), "wss");
    }

    #[test]
    fn test_config_load_from_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{ "log_level": "debug", "social_providers": { "apple": false } }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert!(!config.social_providers.apple);
        assert!(config.social_providers.google);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("LEAGUER_BACKEND_URL", "https://api.leaguer.app"),
            ("LEAGUER_WS_PORT", "9100"),
            ("LEAGUER_REQUEST_TIMEOUT_SECS", "5"),
            ("LEAGUER_ENABLE_FACEBOOK_LOGIN", "false"),
            ("LEAGUER_ENCRYPTION_KEY", "rotated"),
        ]));

        assert_eq!(config.backend_url, "https://api.leaguer.app");
        assert_eq!(config.ws_port, 9100);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(!config.social_providers.facebook);
        assert_eq!(config.encryption_key, "rotated");
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("LEAGUER_WS_PORT", "not-a-port"),
            ("LEAGUER_ENABLE_GOOGLE_LOGIN", "maybe"),
            ("LEAGUER_LOG_LEVEL", "   "),
        ]));

        assert_eq!(config.ws_port, DEFAULT_WS_PORT);
        assert!(config.social_providers.google);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.backend_url = "not a valid url".to_string();
        assert!(config.backend_url().is_err());
    }
}
