//! WebSocket live channel client.

use crate::message::{build_channel_url, outbound_frame, ping_frame};
use crate::registry::{HandlerRegistry, MessageHandler, StateHandler, Subscription, WILDCARD};
use crate::{ChannelConfig, ChannelError, ChannelMessage, ChannelResult, ConnectionState};
use device_identity::DeviceIdProvider;
use futures_util::{SinkExt, StreamExt};
use leaguer_storage::SessionVault;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const OUTBOUND_QUEUE: usize = 100;
/// Reported when the server goes away without a close frame.
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// How a live socket ended.
#[derive(Debug)]
enum LinkEnd {
    /// `disconnect()` was called.
    Shutdown,
    /// The peer closed the socket or the stream ended.
    Closed(String),
    /// Transport-level failure.
    Failed(String),
}

/// Per-user live channel with automatic reconnection.
///
/// Cloning is cheap; clones share the connection and handlers.
#[derive(Clone)]
pub struct LiveChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    config: ChannelConfig,
    vault: SessionVault,
    device: Arc<DeviceIdProvider>,
    state: Mutex<ConnectionState>,
    link: Mutex<LinkSlot>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    registry: Arc<HandlerRegistry>,
}

/// Outbound queue of the current link.
///
/// `connect` and `disconnect` bump the generation. A supervisor only touches
/// the sender or the connection state while the generation it was started
/// with is still current. Lock order: `link`, then `state`.
#[derive(Default)]
struct LinkSlot {
    generation: u64,
    sender: Option<mpsc::Sender<Message>>,
}

impl LiveChannel {
    pub fn new(config: ChannelConfig, vault: SessionVault, device: Arc<DeviceIdProvider>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                config,
                vault,
                device,
                state: Mutex::new(ConnectionState::default()),
                link: Mutex::new(LinkSlot::default()),
                shutdown: Mutex::new(None),
                registry: Arc::new(HandlerRegistry::default()),
            }),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Snapshot of the connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().is_connected
    }

    /// Open the channel for the cached user.
    ///
    /// Returns once the socket is open; reading, pinging and reconnecting
    /// continue in a background task. No-op while open or opening.
    pub async fn connect(&self) -> ChannelResult<()> {
        let Some(generation) = self.inner.begin_connecting() else {
            debug!("Live channel already connecting or connected");
            return Ok(());
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        if let Some(previous) = self.inner.shutdown.lock().replace(shutdown_tx) {
            let _ = previous.send(true);
        }

        match self.inner.open().await {
            Ok(socket) => {
                let Some(outbound) = self.inner.mark_open(generation) else {
                    debug!("Live channel disconnected while opening");
                    return Ok(());
                };
                tokio::spawn(supervise(
                    Arc::clone(&self.inner),
                    generation,
                    (socket, outbound),
                    shutdown_rx,
                ));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to open live channel");
                let message = e.to_string();
                self.inner.update_state_for(generation, |state| {
                    state.is_connecting = false;
                    state.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Close the socket, stop pinging and reconnecting, reset state to idle.
    ///
    /// Safe to call at any time, any number of times.
    pub fn disconnect(&self) {
        if let Some(shutdown) = self.inner.shutdown.lock().take() {
            let _ = shutdown.send(true);
        }

        let reset = {
            let mut link = self.inner.link.lock();
            link.generation += 1;
            link.sender = None;
            let mut state = self.inner.state.lock();
            if state.is_idle() {
                None
            } else {
                *state = ConnectionState::default();
                Some(state.clone())
            }
        };
        if let Some(snapshot) = reset {
            info!("Live channel disconnected");
            self.inner.registry.dispatch_state(&snapshot);
        }
    }

    /// Send `{type, ...data, deviceId, timestamp}`.
    pub async fn send(&self, message_type: &str, data: Value) -> ChannelResult<()> {
        let sender = match (self.is_connected(), self.inner.link.lock().sender.clone()) {
            (true, Some(sender)) => sender,
            _ => return Err(ChannelError::NotConnected),
        };

        let frame = outbound_frame(message_type, data, &self.inner.device.get_device_id());
        let text = serde_json::to_string(&frame)?;
        sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    /// Register a handler for one message type. `"*"` matches every type.
    pub fn on_message<F>(&self, message_type: &str, handler: F) -> Subscription
    where
        F: Fn(&ChannelMessage) + Send + Sync + 'static,
    {
        let handler: MessageHandler = Arc::new(handler);
        self.inner.registry.on_message(message_type, handler)
    }

    pub fn on_any_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChannelMessage) + Send + Sync + 'static,
    {
        self.on_message(WILDCARD, handler)
    }

    /// Called synchronously on every state change.
    pub fn on_connection_state_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let handler: StateHandler = Arc::new(handler);
        self.inner.registry.on_state(handler)
    }
}

impl ChannelInner {
    /// Move from idle/error to connecting and take a new link generation.
    /// `None` if already open or opening.
    fn begin_connecting(&self) -> Option<u64> {
        let (generation, snapshot) = {
            let mut link = self.link.lock();
            let mut state = self.state.lock();
            if state.is_connected || state.is_connecting {
                return None;
            }
            state.is_connecting = true;
            state.error = None;
            link.generation += 1;
            link.sender = None;
            (link.generation, state.clone())
        };
        self.registry.dispatch_state(&snapshot);
        Some(generation)
    }

    /// Apply `change` if `generation` still owns the channel.
    fn update_state_for(&self, generation: u64, change: impl FnOnce(&mut ConnectionState)) -> bool {
        let snapshot = {
            let link = self.link.lock();
            if link.generation != generation {
                debug!(generation, current = link.generation, "Ignoring stale link update");
                return false;
            }
            let mut state = self.state.lock();
            change(&mut state);
            state.clone()
        };
        self.registry.dispatch_state(&snapshot);
        true
    }

    /// Install a fresh outbound queue and report the channel open.
    ///
    /// `None` if a later `connect` or `disconnect` took over.
    fn mark_open(&self, generation: u64) -> Option<mpsc::Receiver<Message>> {
        let (tx, rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let snapshot = {
            let mut link = self.link.lock();
            if link.generation != generation {
                return None;
            }
            link.sender = Some(tx);
            let mut state = self.state.lock();
            *state = ConnectionState {
                is_connected: true,
                ..ConnectionState::default()
            };
            state.clone()
        };
        info!("Live channel connected");
        self.registry.dispatch_state(&snapshot);
        Some(rx)
    }

    fn release_sender(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation {
            link.sender = None;
        }
    }

    /// Read fresh credentials and open a socket.
    async fn open(&self) -> ChannelResult<Socket> {
        let user_id = self.vault.user_id().ok_or(ChannelError::MissingUserId)?;
        let token = self.vault.access_token().unwrap_or_default();
        let device_id = self.device.get_device_id();

        let url = build_channel_url(&self.config.ws_url, &user_id, &token, &device_id)?;
        info!(user_id = %user_id, host = ?url.host_str(), "Connecting live channel");

        let (socket, _) = connect_async(url.as_str()).await?;
        Ok(socket)
    }

    fn handle_text(&self, text: &str) {
        let message = match ChannelMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse live channel message");
                return;
            }
        };

        if message.is_echo_of(&self.device.get_device_id()) {
            debug!(message_type = %message.message_type, "Dropping own echo");
            return;
        }

        let delivered = self.registry.dispatch_message(&message);
        debug!(message_type = %message.message_type, delivered, "Dispatched live message");
    }

    /// Pump one socket until it ends.
    async fn run_link(
        &self,
        generation: u64,
        socket: Socket,
        mut msg_rx: mpsc::Receiver<Message>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> LinkEnd {
        let (mut write, mut read) = socket.split();

        let period = self.config.ping_interval;
        let mut ping = interval_at(Instant::now() + period, period);

        let end = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        break LinkEnd::Shutdown;
                    }
                }
                Some(outbound) = msg_rx.recv() => {
                    if let Err(e) = write.send(outbound).await {
                        break LinkEnd::Failed(e.to_string());
                    }
                }
                _ = ping.tick() => {
                    let token = self.vault.access_token().unwrap_or_default();
                    let frame = ping_frame(&self.device.get_device_id(), &token);
                    if let Err(e) = write.send(Message::Text(frame.to_string().into())).await {
                        debug!(error = %e, "Ping failed");
                    }
                }
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => break LinkEnd::Closed(close_reason(frame)),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Live channel socket error");
                        break LinkEnd::Failed(e.to_string());
                    }
                    None => break LinkEnd::Closed(ABNORMAL_CLOSE_CODE.to_string()),
                },
            }
        };

        self.release_sender(generation);
        end
    }
}

fn close_reason(frame: Option<CloseFrame>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => frame.reason.as_str().to_string(),
        Some(frame) => u16::from(frame.code).to_string(),
        None => ABNORMAL_CLOSE_CODE.to_string(),
    }
}

/// Keep the channel alive until shutdown or until reconnection gives up.
async fn supervise(
    inner: Arc<ChannelInner>,
    generation: u64,
    first: (Socket, mpsc::Receiver<Message>),
    mut shutdown: watch::Receiver<bool>,
) {
    let mut link = Some(first);
    let mut attempt: u32 = 0;

    loop {
        if let Some((socket, outbound)) = link.take() {
            let owned = match inner.run_link(generation, socket, outbound, &mut shutdown).await {
                LinkEnd::Shutdown => return,
                LinkEnd::Closed(reason) => {
                    info!(reason = %reason, "Live channel closed");
                    inner.update_state_for(generation, |state| {
                        state.is_connected = false;
                        state.is_connecting = false;
                        state.error = Some(format!("Disconnected: {}", reason));
                    })
                }
                LinkEnd::Failed(detail) => {
                    warn!(error = %detail, "Live channel link failed");
                    inner.record_transport_error(generation)
                }
            };
            if !owned {
                return;
            }
            attempt = 0;
        }

        attempt += 1;
        if attempt > inner.config.max_reconnect_attempts {
            warn!("Max reconnect attempts reached");
            return;
        }

        let delay = inner.config.reconnect_delay(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return,
        }
        if *shutdown.borrow() {
            return;
        }

        if !inner.update_state_for(generation, |state| state.is_connecting = true) {
            return;
        }
        let opened = tokio::select! {
            opened = inner.open() => opened,
            _ = shutdown.changed() => return,
        };
        match opened {
            Ok(_) if *shutdown.borrow() => return,
            Ok(socket) => match inner.mark_open(generation) {
                Some(outbound) => link = Some((socket, outbound)),
                None => return,
            },
            Err(e) => {
                error!(error = %e, "Reconnect failed");
                if !inner.record_transport_error(generation) {
                    return;
                }
            }
        }
    }
}

impl ChannelInner {
    fn record_transport_error(&self, generation: u64) -> bool {
        self.update_state_for(generation, |state| {
            state.is_connected = false;
            state.is_connecting = false;
            state.error = Some("WebSocket error".to_string());
            state.reconnect_attempts += 1;
        })
    }
}
