//! HTTP gateway for the Leaguer backend.
//!
//! This crate provides:
//! - `SessionGateway`, which attaches the device id and bearer token to every
//!   request and recovers from an expired access token with a single shared
//!   refresh followed by one retry
//! - Error classification into `GatewayError` with user-facing messages
//! - `PublicApiClient` for the endpoints that need no session
//! - The `HttpTransport` and `Notifier` seams

mod classify;
mod error;
mod gateway;
mod notifier;
mod public;
mod refresh;
mod request;
mod transport;

#[cfg(test)]
mod tests;

pub use classify::ApiResponse;
pub use error::{
    ErrorKind, FieldErrors, GatewayError, GatewayResult, MSG_ACCESS_DENIED, MSG_BAD_REQUEST,
    MSG_GENERIC, MSG_INVALID_CREDENTIALS, MSG_NETWORK, MSG_NOT_FOUND, MSG_SERVER_ERROR,
    MSG_SESSION_EXPIRED, MSG_UNEXPECTED,
};
pub use gateway::{GatewayConfig, GatewayEvent, SessionGateway, REFRESH_PATH};
pub use notifier::{Notifier, Severity, TracingNotifier};
pub use public::{
    ApiEnvelope, ContactMessage, PublicApiClient, CONTACT_PATH, DEFAULT_GEOLOCATION_FIELDS,
    GEOLOCATION_PATH, HEALTH_PATH, INFO_PATH,
};
pub use refresh::RefreshFailure;
pub use request::{ApiRequest, AuthMode};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestTransport,
    TransportError, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_DEVICE_ID,
    JSON_CONTENT_TYPE,
};
