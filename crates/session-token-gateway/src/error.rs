//! Error types for gateway calls.

use crate::transport::TransportError;
use leaguer_storage::StorageError;
use std::collections::BTreeMap;
use thiserror::Error;

pub const MSG_BAD_REQUEST: &str = "Bad request";
pub const MSG_ACCESS_DENIED: &str = "Access denied";
pub const MSG_NOT_FOUND: &str = "Resource not found";
pub const MSG_SERVER_ERROR: &str = "Server error. Please try again.";
pub const MSG_GENERIC: &str = "An error occurred";
pub const MSG_NETWORK: &str = "Network error. Please check your connection.";
pub const MSG_SESSION_EXPIRED: &str = "Session expired. Please login again.";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const MSG_UNEXPECTED: &str = "An unexpected error occurred.";

/// Per-field validation messages as sent by the backend.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Coarse error class used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Network,
    Server,
    Client,
    Storage,
}

/// Error type for gateway requests.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// 400 with an optional per-field breakdown
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    /// 401 that survived the refresh, or refresh itself failed
    #[error("{0}")]
    Authentication(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Server error. Please try again.")]
    Server { status: u16 },

    /// Any other non-success status
    #[error("{message}")]
    Http { status: u16, message: String },

    /// No response received
    #[error("Network error. Please check your connection.")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    /// Validation error on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![message.clone()]);
        Self::Validation { message, fields }
    }

    pub fn session_expired() -> Self {
        Self::Authentication(MSG_SESSION_EXPIRED.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Network(_) | Self::Timeout => ErrorKind::Network,
            Self::Server { .. } => ErrorKind::Server,
            Self::Forbidden | Self::NotFound | Self::Http { .. } | Self::Decode(_) => {
                ErrorKind::Client
            }
            Self::Storage(_) | Self::InvalidUrl(_) => ErrorKind::Storage,
        }
    }

    /// Check if the same request might succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::Server { .. })
    }

    /// HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            Self::Authentication(_) => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::Server { status } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Per-field messages for validation errors; empty otherwise.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => MSG_NETWORK.to_string(),
            Self::Storage(_) | Self::Decode(_) | Self::InvalidUrl(_) => MSG_UNEXPECTED.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Connect(detail) | TransportError::Other(detail) => Self::Network(detail),
        }
    }
}

/// Result type for gateway requests.
pub type GatewayResult<T> = Result<T, GatewayError>;
