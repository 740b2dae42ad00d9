//! Coordinated access-token refresh.
//!
//! At most one refresh call is outstanding per gateway. Requests that hit a
//! 401 while a refresh is running await the same shared future instead of
//! starting their own.

use crate::classify::summarize_response_body;
use crate::error::MSG_SESSION_EXPIRED;
use crate::notifier::{Notifier, Severity};
use crate::transport::{
    HttpMethod, HttpRequest, HttpTransport, RequestBody, HEADER_CONTENT_TYPE, HEADER_DEVICE_ID,
    JSON_CONTENT_TYPE,
};
use crate::GatewayEvent;
use device_identity::DeviceIdProvider;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use leaguer_storage::{SessionVault, TokenPair};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Why a refresh did not produce a new access token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("no stored session")]
    NoSession,
    #[error("no refresh token stored")]
    NoRefreshToken,
    #[error("refresh rejected with status {0}")]
    Rejected(u16),
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("malformed refresh response: {0}")]
    Malformed(String),
    #[error("failed to store refreshed tokens: {0}")]
    Storage(String),
    /// The session was cleared or replaced while the refresh was running.
    #[error("session changed during refresh")]
    Superseded,
}

pub(crate) type RefreshOutcome = Result<String, RefreshFailure>;
pub(crate) type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    generation: u64,
    future: SharedRefresh,
}

/// Single-flight slot for the refresh future.
#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    slot: Arc<Mutex<Option<InFlight>>>,
    generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight refresh, or install `start()` as the new one.
    ///
    /// The slot is filled before this returns, so a caller arriving right
    /// after sees the same future even if nobody has polled it yet. The slot
    /// is emptied when the refresh finishes, whatever the outcome.
    pub fn join_or_start<F>(&self, start: F) -> SharedRefresh
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let mut slot = self.slot.lock();
        if let Some(in_flight) = slot.as_ref() {
            debug!(generation = in_flight.generation, "Joining in-flight token refresh");
            return in_flight.future.clone();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let job = start();
        let slot_handle = Arc::clone(&self.slot);
        let future = async move {
            let outcome = job.await;
            let mut slot = slot_handle.lock();
            if slot.as_ref().map(|f| f.generation) == Some(generation) {
                *slot = None;
            }
            outcome
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            generation,
            future: future.clone(),
        });
        future
    }

    /// Number of refreshes started so far.
    pub fn started(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Everything the refresh job needs, detached from the gateway's lifetime.
#[derive(Clone)]
pub(crate) struct RefreshContext {
    pub url: String,
    pub transport: Arc<dyn HttpTransport>,
    pub vault: SessionVault,
    pub device: Arc<DeviceIdProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub events: broadcast::Sender<GatewayEvent>,
}

impl RefreshContext {
    /// Exchange the stored refresh token for a new access token.
    ///
    /// On failure the stored credentials are wiped, `SessionExpired` is
    /// broadcast and the user is told once. A superseded refresh leaves the
    /// store alone: whoever changed the session owns it now.
    pub async fn run(self) -> RefreshOutcome {
        match self.exchange().await {
            Ok(access) => Ok(access),
            Err(RefreshFailure::Superseded) => {
                info!("Session changed during token refresh, discarding result");
                Err(RefreshFailure::Superseded)
            }
            Err(failure) => {
                warn!(error = %failure, "Token refresh failed, expiring session");
                self.expire_session();
                Err(failure)
            }
        }
    }

    async fn exchange(&self) -> RefreshOutcome {
        let session = self.vault.locate_session().ok_or(RefreshFailure::NoSession)?;
        let refresh_token = session
            .refresh_token
            .clone()
            .ok_or(RefreshFailure::NoRefreshToken)?;

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.url.clone(),
            headers: vec![
                (HEADER_DEVICE_ID.to_string(), self.device.get_device_id()),
                (HEADER_CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string()),
            ],
            body: RequestBody::Json(json!({ "refresh": refresh_token })),
        };

        debug!(location = ?session.location, "Refreshing access token");
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        if !response.is_success() {
            let body_summary = summarize_response_body(&response.body);
            error!(status = response.status, body_summary = %body_summary, "Token refresh rejected");
            return Err(RefreshFailure::Rejected(response.status));
        }

        let parsed: RefreshResponse = serde_json::from_str(&response.body)
            .map_err(|e| RefreshFailure::Malformed(e.to_string()))?;

        // The backend may not rotate the refresh token.
        let pair = TokenPair::new(parsed.access, parsed.refresh.unwrap_or(refresh_token));
        let written = self
            .vault
            .rotate_tokens(&session, &pair)
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?;
        if !written {
            return Err(RefreshFailure::Superseded);
        }

        info!(location = ?session.location, "Access token refreshed");
        let _ = self.events.send(GatewayEvent::TokensRefreshed {
            location: session.location,
        });
        Ok(pair.access_token)
    }

    fn expire_session(&self) {
        if let Err(e) = self.vault.clear_tokens() {
            warn!(error = %e, "Failed to clear tokens after refresh failure");
        }
        let _ = self.events.send(GatewayEvent::SessionExpired);
        self.notifier.notify(Severity::Error, MSG_SESSION_EXPIRED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_job() {
        let coordinator = RefreshCoordinator::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let make_job = |runs: Arc<AtomicUsize>| {
            move || {
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, RefreshFailure>("fresh".to_string())
                }
                .boxed()
            }
        };

        let first = coordinator.join_or_start(make_job(runs.clone()));
        let second = coordinator.join_or_start(make_job(runs.clone()));
        assert!(coordinator.in_flight());

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap(), "fresh");
        assert_eq!(b.unwrap(), "fresh");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.started(), 1);
        assert!(!coordinator.in_flight());
    }

    #[tokio::test]
    async fn test_slot_cleared_after_failure() {
        let coordinator = RefreshCoordinator::new();

        let outcome = coordinator
            .join_or_start(|| async { Err::<String, _>(RefreshFailure::NoRefreshToken) }.boxed())
            .await;
        assert_eq!(outcome, Err(RefreshFailure::NoRefreshToken));
        assert!(!coordinator.in_flight());

        let outcome = coordinator
            .join_or_start(|| async { Ok::<_, RefreshFailure>("second".to_string()) }.boxed())
            .await;
        assert_eq!(outcome.unwrap(), "second");
        assert_eq!(coordinator.started(), 2);
    }
}
