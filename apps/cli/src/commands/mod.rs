//! CLI command implementations.

mod account;
mod auth;
mod live;
mod public;

pub use account::{change_password, reset_password, update_profile, verify_email, whoami};
pub use auth::{login, logout, social_login, status};
pub use live::{listen, send};
pub use public::{health, info};

use anyhow::{Context, Result};
use leaguer_config_and_utils::{Config, Paths};
use session_lifecycle_orchestrator::{AuthError, LeaguerSession};
use std::io::{self, Write};
use tokio::task::JoinHandle;
use tracing::debug;

/// A started session plus its expiry listener.
pub struct Client {
    pub session: LeaguerSession,
    listener: JoinHandle<()>,
}

impl Drop for Client {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Build the session services from `~/.leaguer` and restore any stored
/// session.
pub fn open_client(config: &Config, paths: &Paths) -> Result<Client> {
    paths
        .ensure_dirs()
        .context("Failed to create the Leaguer data directory")?;
    let session = LeaguerSession::build(config, paths).map_err(auth_failure)?;
    let (state, listener) = session.start();
    debug!(state = state.as_str(), "Session restored");
    Ok(Client { session, listener })
}

/// Turn an auth error into a CLI error, printing field errors first.
pub fn auth_failure(err: AuthError) -> anyhow::Error {
    if let Some(fields) = err.field_errors() {
        for (field, messages) in fields {
            for message in messages {
                eprintln!("  {}: {}", field, message);
            }
        }
    }
    anyhow::anyhow!(err.user_message())
}

/// Read one trimmed line from stdin after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Read a value without echo, rejecting empty input.
fn prompt_secret(label: &str, what: &str) -> Result<String> {
    let value = rpassword::prompt_password(label)?;
    if value.is_empty() {
        anyhow::bail!("{} is required", what);
    }
    Ok(value)
}
