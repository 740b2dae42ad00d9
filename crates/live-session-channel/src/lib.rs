//! Live channel for the Leaguer client.
//!
//! This crate provides:
//! - A per-user WebSocket connection authenticated with the session's token
//!   and device id
//! - Automatic reconnection with exponential backoff
//! - Keepalive pings
//! - Typed and wildcard message handlers, with the client's own echoes dropped

mod channel;
mod config;
mod error;
mod message;
mod registry;

#[cfg(test)]
mod tests;

pub use channel::LiveChannel;
pub use config::ChannelConfig;
pub use error::{ChannelError, ChannelResult};
pub use message::{
    build_channel_url, now_timestamp, outbound_frame, ping_frame, ChannelMessage,
    ConnectionState, PING_TYPE,
};
pub use registry::{MessageHandler, StateHandler, Subscription, WILDCARD};
