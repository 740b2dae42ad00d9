//! Frame shapes for the live channel.

use crate::{ChannelError, ChannelResult};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

pub const PING_TYPE: &str = "ping";

/// Observable connection status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub error: Option<String>,
    pub reconnect_attempts: u32,
}

impl ConnectionState {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Inbound message as delivered to handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    /// The full frame as received, including `type`.
    pub data: Value,
    pub device_id: Option<String>,
    /// Sender timestamp, or receive time when the frame had none.
    pub timestamp: String,
}

/// ISO-8601 UTC timestamp with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ChannelMessage {
    /// Parse a text frame. Frames that are not JSON objects are rejected.
    pub fn parse(text: &str) -> ChannelResult<Self> {
        let data: Value = serde_json::from_str(text)?;
        let Value::Object(fields) = &data else {
            return Err(ChannelError::Malformed(format!(
                "expected a JSON object frame, got {}",
                kind_of(&data)
            )));
        };

        let message_type = fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let device_id = fields
            .get("deviceId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let timestamp = fields
            .get("timestamp")
            .and_then(Value::as_str)
            .filter(|ts| !ts.is_empty())
            .map(str::to_string)
            .unwrap_or_else(now_timestamp);

        Ok(Self {
            message_type,
            data,
            device_id,
            timestamp,
        })
    }

    /// True when this frame was sent by `own_device_id`.
    pub fn is_echo_of(&self, own_device_id: &str) -> bool {
        self.device_id.as_deref() == Some(own_device_id)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Outgoing frame: `{type, ...data, deviceId, timestamp}`.
///
/// Object payloads are flattened into the frame; anything else is carried
/// under `data`.
pub fn outbound_frame(message_type: &str, data: Value, device_id: &str) -> Value {
    let mut frame = Map::new();
    frame.insert("type".to_string(), Value::String(message_type.to_string()));
    match data {
        Value::Object(fields) => frame.extend(fields),
        Value::Null => {}
        other => {
            frame.insert("data".to_string(), other);
        }
    }
    frame.insert("deviceId".to_string(), Value::String(device_id.to_string()));
    frame.insert("timestamp".to_string(), Value::String(now_timestamp()));
    Value::Object(frame)
}

/// Keepalive frame.
pub fn ping_frame(device_id: &str, token: &str) -> Value {
    serde_json::json!({
        "type": PING_TYPE,
        "deviceId": device_id,
        "token": token,
        "timestamp": now_timestamp(),
    })
}

/// `<base>/ws/profile/<user_id>/?token=..&deviceId=..` with http(s) mapped to ws(s).
pub fn build_channel_url(
    base: &Url,
    user_id: &str,
    token: &str,
    device_id: &str,
) -> ChannelResult<Url> {
    let joined = format!(
        "{}/ws/profile/{}/",
        base.as_str().trim_end_matches('/'),
        user_id
    );
    let mut url = Url::parse(&joined)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ChannelError::InvalidUrl(format!("unsupported scheme {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| ChannelError::InvalidUrl(format!("cannot use scheme {}", scheme)))?;

    url.query_pairs_mut()
        .append_pair("token", token)
        .append_pair("deviceId", device_id);
    Ok(url)
}
