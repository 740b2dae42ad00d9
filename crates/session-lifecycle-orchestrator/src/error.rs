//! Errors surfaced by session flows.

use crate::SocialProvider;
use leaguer_storage::StorageError;
use session_token_gateway::{ErrorKind, FieldErrors, GatewayError, MSG_UNEXPECTED};
use thiserror::Error;

/// Error type for session flows.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Rejected input, with per-field messages when the backend sent them
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    /// Bad credentials, or the session could not be recovered
    #[error("{0}")]
    Authentication(String),

    /// No response from the backend
    #[error("{0}")]
    Network(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    /// Any other rejection (403, 404, 409, ...)
    #[error("{message}")]
    Client { status: Option<u16>, message: String },

    /// Provider switched off in configuration
    #[error("Sign-in with {0} is disabled")]
    ProviderDisabled(SocialProvider),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid state transition in the session FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    /// Validation error on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![message.clone()]);
        Self::Validation { message, fields }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::ProviderDisabled(_) => ErrorKind::Validation,
            Self::Authentication(_) | Self::NotLoggedIn => ErrorKind::Authentication,
            Self::Network(_) => ErrorKind::Network,
            Self::Server { .. } => ErrorKind::Server,
            Self::Client { .. } | Self::Decode(_) | Self::InvalidStateTransition(_) => {
                ErrorKind::Client
            }
            Self::Storage(_) | Self::Config(_) => ErrorKind::Storage,
        }
    }

    /// Returns true if retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// Per-field messages for validation errors.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Storage(_) | Self::Decode(_) | Self::Config(_) => MSG_UNEXPECTED.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<GatewayError> for AuthError {
    fn from(err: GatewayError) -> Self {
        let status = err.status();
        let message = err.user_message();
        match err {
            GatewayError::Validation { message, fields } => Self::Validation { message, fields },
            GatewayError::Authentication(message) => Self::Authentication(message),
            GatewayError::Network(_) | GatewayError::Timeout => Self::Network(message),
            GatewayError::Server { status } => Self::Server { status, message },
            GatewayError::Forbidden | GatewayError::NotFound | GatewayError::Http { .. } => {
                Self::Client { status, message }
            }
            GatewayError::Storage(e) => Self::Storage(e),
            GatewayError::Decode(detail) => Self::Decode(detail),
            GatewayError::InvalidUrl(e) => Self::Config(e.to_string()),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
