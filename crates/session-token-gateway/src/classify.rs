//! Mapping of HTTP responses to typed results.

use crate::error::{
    FieldErrors, GatewayError, MSG_BAD_REQUEST, MSG_GENERIC, MSG_INVALID_CREDENTIALS,
    MSG_SESSION_EXPIRED,
};
use crate::request::AuthMode;
use crate::transport::HttpResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Keys in an error body that are envelope fields, not form fields.
const ENVELOPE_KEYS: [&str; 4] = ["message", "success", "detail", "errors"];

/// Log-safe fingerprint of a response body. Bodies may carry tokens.
pub(crate) fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// A successful response with its parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `Value::Null` for empty bodies.
    pub body: Value,
}

impl ApiResponse {
    pub(crate) fn from_http(response: &HttpResponse) -> Result<Self, GatewayError> {
        Ok(Self {
            status: response.status,
            body: parse_body(&response.body)?,
        })
    }

    /// Deserialize the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        serde_json::from_value(self.body.clone()).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// `message` field of the body, if it is a string.
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

fn parse_body(body: &str) -> Result<Value, GatewayError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Turn a non-success response into a [`GatewayError`].
///
/// A bare 401 on an anonymous request is a credentials failure, not an
/// expired session.
pub(crate) fn classify_failure(response: &HttpResponse, auth: AuthMode) -> GatewayError {
    // Error bodies are best-effort: HTML error pages parse as Null.
    let body = parse_body(&response.body).unwrap_or(Value::Null);
    let message = body_message(&body);

    match response.status {
        400 => GatewayError::Validation {
            message: message.unwrap_or_else(|| MSG_BAD_REQUEST.to_string()),
            fields: field_errors(&body),
        },
        401 => GatewayError::Authentication(message.unwrap_or_else(|| {
            match auth {
                AuthMode::Session => MSG_SESSION_EXPIRED,
                AuthMode::Anonymous => MSG_INVALID_CREDENTIALS,
            }
            .to_string()
        })),
        403 => GatewayError::Forbidden,
        404 => GatewayError::NotFound,
        status @ 500..=599 => GatewayError::Server { status },
        status => GatewayError::Http {
            status,
            message: message.unwrap_or_else(|| MSG_GENERIC.to_string()),
        },
    }
}

fn body_message(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.get("detail"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// Per-field messages from either `{"errors": {field: [..]}}` or a flat
/// `{field: [..] | ".."}` body.
fn field_errors(body: &Value) -> FieldErrors {
    let source = match body.get("errors") {
        Some(Value::Object(errors)) => errors,
        _ => match body {
            Value::Object(map) => map,
            _ => return FieldErrors::new(),
        },
    };

    source
        .iter()
        .filter(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let messages: Vec<String> = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => return None,
            };
            (!messages.is_empty()).then(|| (key.clone(), messages))
        })
        .collect()
}
