//! Live channel error types.

use thiserror::Error;

/// Live channel error type.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No cached user to address the per-user channel
    #[error("User ID not found")]
    MissingUserId,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Channel URL could not be built
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),

    /// Not connected error
    #[error("WebSocket not connected")]
    NotConnected,

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound frame of the wrong shape
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// Send error
    #[error("Failed to send message: {0}")]
    Send(String),
}

impl From<url::ParseError> for ChannelError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Result type alias using ChannelError.
pub type ChannelResult<T> = Result<T, ChannelError>;
