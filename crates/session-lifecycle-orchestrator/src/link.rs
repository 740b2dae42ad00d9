//! Seam between session flows and the live channel.

use async_trait::async_trait;
use live_session_channel::{ChannelResult, LiveChannel};

/// The part of the live channel the session lifecycle drives.
#[async_trait]
pub trait LiveLink: Send + Sync {
    /// Open the channel for the stored user.
    async fn connect(&self) -> ChannelResult<()>;

    /// Close the channel. Must be safe to call when already closed.
    fn disconnect(&self);
}

#[async_trait]
impl LiveLink for LiveChannel {
    async fn connect(&self) -> ChannelResult<()> {
        LiveChannel::connect(self).await
    }

    fn disconnect(&self) {
        LiveChannel::disconnect(self)
    }
}
