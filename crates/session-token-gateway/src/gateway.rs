//! Authenticated request pipeline.

use crate::classify::{classify_failure, summarize_response_body, ApiResponse};
use crate::error::{GatewayError, GatewayResult};
use crate::notifier::{Notifier, Severity};
use crate::refresh::{RefreshContext, RefreshCoordinator, RefreshFailure};
use crate::request::{ApiRequest, AuthMode};
use crate::transport::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody, HEADER_AUTHORIZATION,
    HEADER_CONTENT_TYPE, HEADER_DEVICE_ID, JSON_CONTENT_TYPE,
};
use device_identity::DeviceIdProvider;
use futures_util::FutureExt;
use leaguer_config_and_utils::{Config, CoreResult};
use leaguer_storage::{SessionVault, StorageTier, TokenLocation, TokenPair};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;

pub const REFRESH_PATH: &str = "/accounts/api/token/refresh/";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session-level events broadcast by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Refresh failed; stored credentials have been cleared.
    SessionExpired,
    /// A refresh succeeded and the new pair was written to `location`.
    TokensRefreshed { location: TokenLocation },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub refresh_path: String,
}

impl GatewayConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(leaguer_config_and_utils::DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_path: REFRESH_PATH.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> CoreResult<Self> {
        Ok(Self {
            timeout: config.request_timeout(),
            ..Self::new(config.backend_url()?)
        })
    }

    /// Absolute URL for `path` with `query` appended.
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> GatewayResult<String> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        let mut url = Url::parse(&joined)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url.into())
    }
}

/// HTTP client that carries the session's credentials.
///
/// Every request gets the device id header. Session requests also get the
/// stored bearer token; a 401 on one of them triggers a coordinated refresh
/// and exactly one retry.
pub struct SessionGateway {
    config: GatewayConfig,
    transport: Arc<dyn HttpTransport>,
    vault: SessionVault,
    device: Arc<DeviceIdProvider>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<GatewayEvent>,
    refresh: RefreshCoordinator,
}

impl SessionGateway {
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn HttpTransport>,
        vault: SessionVault,
        device: Arc<DeviceIdProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            transport,
            vault,
            device,
            notifier,
            events,
            refresh: RefreshCoordinator::new(),
        }
    }

    /// Gateway backed by a `reqwest` client using the configured timeout.
    pub fn with_reqwest(
        config: GatewayConfig,
        vault: SessionVault,
        device: Arc<DeviceIdProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> GatewayResult<Self> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::new(config, Arc::new(transport), vault, device, notifier))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn vault(&self) -> &SessionVault {
        &self.vault
    }

    pub fn device(&self) -> &Arc<DeviceIdProvider> {
        &self.device
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Number of refresh calls started by this gateway.
    pub fn refreshes_started(&self) -> u64 {
        self.refresh.started()
    }

    // ==========================================
    // Credentials
    // ==========================================

    /// Store a token pair in the durable tier.
    pub fn set_tokens(&self, pair: &TokenPair) -> GatewayResult<()> {
        self.set_tokens_in(StorageTier::Durable, pair)
    }

    pub fn set_tokens_in(&self, tier: StorageTier, pair: &TokenPair) -> GatewayResult<()> {
        self.vault.write_tokens(tier, pair)?;
        Ok(())
    }

    /// Remove tokens from both tiers.
    pub fn clear_tokens(&self) -> GatewayResult<()> {
        self.vault.clear_tokens()?;
        Ok(())
    }

    /// True when an access token is stored in either tier. Expiry is not checked.
    pub fn has_valid_token(&self) -> bool {
        self.vault.has_access_token()
    }

    // ==========================================
    // Requests
    // ==========================================

    pub async fn get(&self, path: &str) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::put(path).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// POST without credentials or refresh handling, for the auth endpoints.
    pub async fn post_unauthenticated(&self, path: &str, body: Value) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::post(path).json(body).anonymous()).await
    }

    /// Send a request, refreshing and retrying once on 401.
    pub async fn send(&self, request: ApiRequest) -> GatewayResult<ApiResponse> {
        let request_id = Uuid::new_v4();
        let token = match request.auth {
            AuthMode::Session => self.vault.access_token(),
            AuthMode::Anonymous => None,
        };

        let response = self.dispatch(&request, token.as_deref(), request_id).await?;
        if response.status != 401 || request.auth == AuthMode::Anonymous {
            return self.complete(&request, response, request_id);
        }

        debug!(%request_id, path = %request.path, "Unauthorized, refreshing access token");
        let fresh = self.recover_access_token(token.as_deref()).await?;
        let retried = self.dispatch(&request, Some(&fresh), request_id).await?;
        self.complete(&request, retried, request_id)
    }

    /// A usable access token after a 401, or the session-expired error.
    async fn recover_access_token(&self, used: Option<&str>) -> GatewayResult<String> {
        match (used, self.vault.access_token()) {
            // Another request already rotated the token.
            (Some(used), Some(current)) if used != current => {
                debug!("Access token already rotated, retrying with the stored one");
                return Ok(current);
            }
            // Another request already expired the session.
            (Some(_), None) => return Err(GatewayError::session_expired()),
            _ => {}
        }

        let context = self.refresh_context();
        match self.refresh.join_or_start(move || context.run().boxed()).await {
            Ok(fresh) => Ok(fresh),
            // A new login may have stored tokens mid-refresh; a logout leaves none.
            Err(RefreshFailure::Superseded) => self
                .vault
                .access_token()
                .ok_or_else(GatewayError::session_expired),
            Err(failure) => {
                debug!(error = %failure, "Refresh did not recover the session");
                Err(GatewayError::session_expired())
            }
        }
    }

    fn refresh_context(&self) -> RefreshContext {
        RefreshContext {
            url: self
                .config
                .url_for(&self.config.refresh_path, &[])
                .unwrap_or_else(|_| self.config.refresh_path.clone()),
            transport: Arc::clone(&self.transport),
            vault: self.vault.clone(),
            device: Arc::clone(&self.device),
            notifier: Arc::clone(&self.notifier),
            events: self.events.clone(),
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        request_id: Uuid,
    ) -> GatewayResult<HttpResponse> {
        let http_request = self.build(request, token)?;
        debug!(
            %request_id,
            method = request.method.as_str(),
            path = %request.path,
            authenticated = token.is_some(),
            "Sending request"
        );

        match self.transport.execute(http_request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(%request_id, path = %request.path, error = %e, "Request failed without response");
                let err = GatewayError::from(e);
                self.notifier.notify(Severity::Error, &err.user_message());
                Err(err)
            }
        }
    }

    fn complete(
        &self,
        request: &ApiRequest,
        response: HttpResponse,
        request_id: Uuid,
    ) -> GatewayResult<ApiResponse> {
        if response.is_success() {
            debug!(%request_id, status = response.status, "Request succeeded");
            return ApiResponse::from_http(&response);
        }

        let body_summary = summarize_response_body(&response.body);
        error!(
            %request_id,
            path = %request.path,
            status = response.status,
            body_summary = %body_summary,
            "Request failed"
        );
        let err = classify_failure(&response, request.auth);
        self.notifier.notify(Severity::Error, &err.user_message());
        Err(err)
    }

    fn build(&self, request: &ApiRequest, token: Option<&str>) -> GatewayResult<HttpRequest> {
        let url = self.config.url_for(&request.path, &request.query)?;

        let mut headers = vec![(HEADER_DEVICE_ID.to_string(), self.device.get_device_id())];
        if let Some(token) = token {
            headers.push((HEADER_AUTHORIZATION.to_string(), format!("Bearer {}", token)));
        }
        match &request.body {
            RequestBody::Binary { content_type, .. } => {
                headers.push((HEADER_CONTENT_TYPE.to_string(), content_type.clone()));
            }
            _ => headers.push((HEADER_CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string())),
        }
        for (name, value) in &request.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        Ok(HttpRequest {
            method: request.method,
            url,
            headers,
            body: request.body.clone(),
        })
    }
}
