//! Login, logout and profile flows.
//!
//! `SessionOrchestrator` decides when credentials are written and cleared and
//! when the live channel is opened and closed. The gateway does the HTTP work
//! and the vault holds the bytes.

use crate::auth_fsm::{AuthState, AuthStateChangedPayload, SessionMachine, SessionMachineInput};
use crate::models::{
    AuthResponse, LoginCredentials, ProfileResponse, ProfileUpdate, SocialLoginRequest,
    PASSWORD_RESET_PATH, SIGN_IN_PATH, SOCIAL_SIGN_IN_PATH, UPDATE_PROFILE_PATH,
    VERIFICATION_EMAIL_PATH,
};
use crate::{AuthError, AuthResult, LiveLink};
use leaguer_config_and_utils::{Config, SocialProviders};
use leaguer_storage::{CachedUser, SessionVault, StorageError, StorageResult, StorageTier};
use parking_lot::Mutex;
use serde_json::{json, Value};
use session_token_gateway::{GatewayEvent, SessionGateway, Severity};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const MSG_LOGIN_SUCCESS: &str = "Signed in successfully.";
pub const MSG_LOGIN_REMEMBERED: &str =
    "Signed in successfully. You will stay signed in on this device.";
pub const MSG_LOGOUT_SUCCESS: &str = "You have been signed out.";
pub const MSG_PROFILE_UPDATED: &str = "Your profile has been updated.";
pub const MSG_PASSWORD_CHANGED: &str = "Your password has been changed.";
pub const MSG_WRONG_PASSWORD: &str = "The current password is incorrect.";

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Arc<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sent as `selected_language` with every account request.
    pub language: String,
    pub social_providers: SocialProviders,
    /// Endpoint told about logouts. `None` skips the server notification.
    pub logout_path: Option<String>,
}

impl OrchestratorConfig {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            social_providers: SocialProviders::default(),
            logout_path: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            social_providers: config.social_providers,
            ..Self::new(config.language.clone())
        }
    }
}

/// Session lifecycle for one client.
///
/// The FSM tracks whether a user is signed in; the credentials themselves live
/// in the vault. A refresh failure reported by the gateway ends the session
/// once [`SessionOrchestrator::spawn_expiry_listener`] is running.
pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    gateway: Arc<SessionGateway>,
    channel: Arc<dyn LiveLink>,
    fsm: Mutex<SessionMachine>,
    state_callback: Mutex<Option<AuthStateCallback>>,
}

impl SessionOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        gateway: Arc<SessionGateway>,
        channel: Arc<dyn LiveLink>,
    ) -> Self {
        Self {
            config,
            gateway,
            channel,
            fsm: Mutex::new(SessionMachine::new()),
            state_callback: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<SessionGateway> {
        &self.gateway
    }

    fn vault(&self) -> &SessionVault {
        self.gateway.vault()
    }

    /// Set a callback to be notified of auth state changes.
    pub fn set_state_callback<F>(&self, callback: F)
    where
        F: Fn(AuthStateChangedPayload) + Send + Sync + 'static,
    {
        *self.state_callback.lock() = Some(Arc::new(callback));
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().state())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// The cached user, but only while credentials are stored alongside it.
    pub fn current_user(&self) -> Option<CachedUser> {
        if !self.gateway.has_valid_token() {
            return None;
        }
        self.vault().read_user()
    }

    /// Transition the FSM and notify the callback if the state changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Auth state transition"
            );
            self.notify_state_change(new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: AuthState) {
        let Some(callback) = self.state_callback.lock().clone() else {
            return;
        };
        let user = state
            .is_authenticated()
            .then(|| self.vault().read_user())
            .flatten();

        callback(AuthStateChangedPayload {
            state,
            user_id: user.as_ref().map(|u| u.id.clone()),
            email: user.and_then(|u| u.email),
        });
    }

    fn notify(&self, severity: Severity, message: &str) {
        self.gateway.notifier().notify(severity, message);
    }

    // ==========================================
    // Startup
    // ==========================================

    /// Derive the initial state from storage.
    ///
    /// A stored access token is trusted without asking the server; the first
    /// request that hits a 401 will refresh or expire it.
    pub fn initialize(&self) -> AuthState {
        if !self.gateway.has_valid_token() {
            info!("No stored session found");
            return self.state();
        }

        match self.transition(&SessionMachineInput::SessionRestored) {
            Ok(state) => {
                let user_id = self.vault().user_id();
                info!(user_id = ?user_id, "Restored stored session");
                state
            }
            Err(e) => {
                debug!(error = %e, "Session state already initialized");
                self.state()
            }
        }
    }

    // ==========================================
    // Sign-in
    // ==========================================

    /// Sign in with a username or email and password.
    ///
    /// With `remember_me` the session goes to the durable tier; without it the
    /// session only lives as long as the ephemeral tier.
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        remember_me: bool,
    ) -> AuthResult<CachedUser> {
        self.transition(&SessionMachineInput::LoginAttempt)?;
        info!(
            email_or_username = %credentials.email_or_username,
            remember_me,
            "Signing in"
        );

        let body = json!({
            "email_or_username": credentials.email_or_username,
            "password": credentials.password,
            "selected_language": self.config.language,
        });
        let tier = StorageTier::for_remember_me(remember_me);
        let result = self.sign_in(SIGN_IN_PATH, body, tier).await;

        let message = if remember_me {
            MSG_LOGIN_REMEMBERED
        } else {
            MSG_LOGIN_SUCCESS
        };
        self.finish_login(result, message).await
    }

    /// Sign in with a third-party identity token. Always durable.
    pub async fn social_login(&self, request: &SocialLoginRequest) -> AuthResult<CachedUser> {
        if !request.provider.is_enabled(&self.config.social_providers) {
            warn!(provider = %request.provider, "Social sign-in provider is disabled");
            return Err(AuthError::ProviderDisabled(request.provider));
        }

        let mut body =
            serde_json::to_value(request).map_err(|e| AuthError::Decode(e.to_string()))?;
        if let Value::Object(fields) = &mut body {
            fields.insert("selected_language".into(), json!(self.config.language));
        }

        self.transition(&SessionMachineInput::LoginAttempt)?;
        info!(provider = %request.provider, "Signing in with third-party provider");

        let result = self
            .sign_in(SOCIAL_SIGN_IN_PATH, body, StorageTier::Durable)
            .await;
        self.finish_login(result, MSG_LOGIN_SUCCESS).await
    }

    async fn sign_in(&self, path: &str, body: Value, tier: StorageTier) -> AuthResult<CachedUser> {
        let response = self.gateway.post_unauthenticated(path, body).await?;
        let auth: AuthResponse = response.json()?;
        if let Some(message) = auth.message.as_deref() {
            debug!(message, "Sign-in response");
        }

        if let Err(e) = self.persist_session(tier, &auth) {
            // Never leave half a session behind.
            let _ = self.vault().clear_session();
            return Err(e.into());
        }
        Ok(auth.user)
    }

    fn persist_session(&self, tier: StorageTier, auth: &AuthResponse) -> StorageResult<()> {
        self.vault().write_tokens(tier, &auth.tokens())?;
        self.vault().write_user(tier, &auth.user)?;
        debug!(?tier, user_id = %auth.user.id, "Stored new session");
        Ok(())
    }

    async fn finish_login(
        &self,
        result: AuthResult<CachedUser>,
        message: &str,
    ) -> AuthResult<CachedUser> {
        let user = match result {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                let _ = self.transition(&SessionMachineInput::LoginFailed);
                return Err(e);
            }
        };

        // A logout that ran while the request was in flight wins.
        if let Err(e) = self.transition(&SessionMachineInput::LoginSuccess) {
            warn!(error = %e, "Session ended during sign-in, discarding credentials");
            let _ = self.vault().clear_session();
            return Err(e);
        }
        info!(user_id = %user.id, "Signed in");

        self.open_channel().await;
        self.notify(Severity::Info, message);
        Ok(user)
    }

    async fn open_channel(&self) {
        if let Err(e) = self.channel.connect().await {
            warn!(error = %e, "Live channel unavailable after sign-in");
        }
    }

    // ==========================================
    // Sign-out
    // ==========================================

    /// Sign out.
    ///
    /// The server notification (if configured) is best effort. Local cleanup
    /// always runs: both tiers, the cached user, the live channel.
    pub async fn logout(&self) -> AuthResult<()> {
        if let Some(path) = self.config.logout_path.as_deref() {
            self.notify_server_of_logout(path).await;
        }

        let result = self.end_session("logout");
        self.notify(Severity::Info, MSG_LOGOUT_SUCCESS);
        result
    }

    async fn notify_server_of_logout(&self, path: &str) {
        let Some(session) = self.vault().locate_session() else {
            debug!("No stored session, skipping logout notification");
            return;
        };

        let body = json!({ "refresh": session.refresh_token });
        match self.gateway.post(path, body).await {
            Ok(_) => debug!("Server notified of logout"),
            Err(e) => warn!(error = %e, "Logout notification failed, clearing session anyway"),
        }
    }

    /// Clear everything the session left behind and go anonymous.
    ///
    /// Every step runs even if an earlier one fails; the first storage error
    /// is returned afterwards.
    fn end_session(&self, reason: &str) -> AuthResult<()> {
        let vault = self.vault();
        let store = vault.store();
        let mut first_error: Option<StorageError> = None;
        let mut record = |step: &str, result: StorageResult<()>| {
            if let Err(e) = result {
                warn!(step, error = %e, "Session cleanup step failed");
                first_error.get_or_insert(e);
            }
        };

        record("session keys", vault.clear_session());
        record("ephemeral tier", store.clear_session().map(|_| ()));
        record("durable tier", store.clear().map(|_| ()));

        self.channel.disconnect();
        let _ = self.transition(&SessionMachineInput::LoggedOut);
        info!(reason, "Session ended");

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Watch the gateway for refresh failures and end the session on each.
    ///
    /// The task holds only a weak reference and stops when the orchestrator
    /// or the gateway goes away.
    pub fn spawn_expiry_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.gateway.subscribe();
        let this = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(GatewayEvent::SessionExpired) => {
                        let Some(orchestrator) = this.upgrade() else {
                            break;
                        };
                        warn!("Session expired, signing out");
                        if let Err(e) = orchestrator.end_session("session expired") {
                            error!(error = %e, "Cleanup after session expiry failed");
                        }
                    }
                    Ok(GatewayEvent::TokensRefreshed { location }) => {
                        debug!(?location, "Access token refreshed");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed gateway events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Session expiry listener stopped");
        })
    }

    // ==========================================
    // Profile
    // ==========================================

    /// Update profile fields. The cached user is replaced by the server's copy.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> AuthResult<CachedUser> {
        self.require_session()?;
        let body = serde_json::to_value(update).map_err(|e| AuthError::Decode(e.to_string()))?;

        let profile = self.put_profile(body).await?;
        info!(user_id = %profile.user.id, "Profile updated");
        self.notify(Severity::Info, MSG_PROFILE_UPDATED);
        Ok(profile.user)
    }

    /// Change the password. Tokens issued in response replace the current pair
    /// in the tier the session lives in.
    pub async fn change_password(&self, current: &str, new: &str) -> AuthResult<()> {
        self.require_session()?;
        let body = json!({
            "current_password": current,
            "new_password": new,
            "update_password": true,
        });

        let profile = self.put_profile(body).await?;
        if profile.wrong_password {
            warn!("Password change rejected: wrong current password");
            return Err(AuthError::field("current_password", MSG_WRONG_PASSWORD));
        }

        info!("Password changed");
        self.notify(Severity::Info, MSG_PASSWORD_CHANGED);
        Ok(())
    }

    async fn put_profile(&self, body: Value) -> AuthResult<ProfileResponse> {
        let response = self.gateway.put(UPDATE_PROFILE_PATH, body).await?;
        let profile: ProfileResponse = response.json()?;
        if let Some(message) = profile.message.as_deref() {
            debug!(message, "Profile response");
        }

        let tier = self.session_tier();
        self.vault().write_user(tier, &profile.user)?;
        if let Some(pair) = profile.rotated_tokens() {
            self.vault().write_tokens(tier, &pair)?;
            info!(?tier, "Stored rotated tokens");
        }
        Ok(profile)
    }

    /// Tier holding the current session; durable when none is found.
    fn session_tier(&self) -> StorageTier {
        self.vault().token_location().unwrap_or(StorageTier::Durable)
    }

    fn require_session(&self) -> AuthResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AuthError::NotLoggedIn)
        }
    }

    // ==========================================
    // Account recovery
    // ==========================================

    /// Ask the backend to send a password reset link. No local state changes.
    pub async fn request_password_reset(&self, identifier: &str) -> AuthResult<Option<String>> {
        let body = json!({
            "email_or_username": identifier,
            "selected_language": self.config.language,
        });
        let response = self
            .gateway
            .post_unauthenticated(PASSWORD_RESET_PATH, body)
            .await?;
        info!("Password reset requested");
        Ok(response.message().map(str::to_string))
    }

    /// Ask the backend to resend the email verification link, for `user_id`
    /// or the cached user.
    pub async fn send_verification_email(
        &self,
        user_id: Option<&str>,
    ) -> AuthResult<Option<String>> {
        let user_id = match user_id {
            Some(id) => id.to_string(),
            None => self.vault().user_id().ok_or(AuthError::NotLoggedIn)?,
        };

        let body = json!({
            "user_id": user_id,
            "selected_language": self.config.language,
        });
        let response = self
            .gateway
            .post_unauthenticated(VERIFICATION_EMAIL_PATH, body)
            .await?;
        info!(user_id = %user_id, "Verification email requested");
        Ok(response.message().map(str::to_string))
    }
}
