//! Application root that wires every session service together.

use crate::{AuthError, AuthResult, AuthState, OrchestratorConfig, SessionOrchestrator};
use device_identity::DeviceIdProvider;
use leaguer_config_and_utils::{Config, Paths};
use leaguer_storage::{open_default_store, SessionVault, StorageTier};
use live_session_channel::{ChannelConfig, LiveChannel};
use session_token_gateway::{
    GatewayConfig, Notifier, PublicApiClient, SessionGateway, TracingNotifier,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Every service of one client session, constructed once and shared by `Arc`.
pub struct LeaguerSession {
    pub config: Config,
    pub vault: SessionVault,
    pub device: Arc<DeviceIdProvider>,
    pub gateway: Arc<SessionGateway>,
    pub channel: LiveChannel,
    pub orchestrator: Arc<SessionOrchestrator>,
    pub public: PublicApiClient,
}

impl LeaguerSession {
    /// Build the services over the default store under `paths`, notifying
    /// through the log.
    pub fn build(config: &Config, paths: &Paths) -> AuthResult<Self> {
        Self::build_with_notifier(config, paths, Arc::new(TracingNotifier))
    }

    pub fn build_with_notifier(
        config: &Config,
        paths: &Paths,
        notifier: Arc<dyn Notifier>,
    ) -> AuthResult<Self> {
        let store = Arc::new(open_default_store(config, paths)?);
        let device = Arc::new(DeviceIdProvider::new(Arc::clone(
            store.backend(StorageTier::Durable),
        )));
        let vault = SessionVault::new(store);

        let gateway_config =
            GatewayConfig::from_config(config).map_err(|e| AuthError::Config(e.to_string()))?;
        let gateway = Arc::new(SessionGateway::with_reqwest(
            gateway_config,
            vault.clone(),
            Arc::clone(&device),
            notifier,
        )?);

        let channel_config =
            ChannelConfig::from_config(config).map_err(|e| AuthError::Config(e.to_string()))?;
        let channel = LiveChannel::new(channel_config, vault.clone(), Arc::clone(&device));

        let orchestrator = Arc::new(SessionOrchestrator::new(
            OrchestratorConfig::from_config(config),
            Arc::clone(&gateway),
            Arc::new(channel.clone()),
        ));
        let public = PublicApiClient::new(Arc::clone(&gateway), config.language.clone());

        Ok(Self {
            config: config.clone(),
            vault,
            device,
            gateway,
            channel,
            orchestrator,
            public,
        })
    }

    /// Restore any stored session and start watching for expiry.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(&self) -> (AuthState, JoinHandle<()>) {
        let listener = self.orchestrator.spawn_expiry_listener();
        (self.orchestrator.initialize(), listener)
    }
}
