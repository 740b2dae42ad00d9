//! Endpoints that need no session: contact form, geolocation, health and info.

use crate::error::{FieldErrors, GatewayResult};
use crate::request::ApiRequest;
use crate::SessionGateway;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const CONTACT_PATH: &str = "/api/contact/";
pub const GEOLOCATION_PATH: &str = "/api/geolocation/";
pub const HEALTH_PATH: &str = "/api/health/";
pub const INFO_PATH: &str = "/api/info/";

pub const DEFAULT_GEOLOCATION_FIELDS: &str = "country,countryCode";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Standard `{success, message, data?, errors?}` body of the public API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

/// Client for the anonymous part of the backend API.
///
/// Requests carry the device id header but never credentials, and a 401
/// never triggers a token refresh.
#[derive(Clone)]
pub struct PublicApiClient {
    gateway: Arc<SessionGateway>,
    language: String,
}

impl PublicApiClient {
    pub fn new(gateway: Arc<SessionGateway>, language: impl Into<String>) -> Self {
        Self {
            gateway,
            language: language.into(),
        }
    }

    /// Submit the contact form.
    pub async fn contact(&self, message: &ContactMessage) -> GatewayResult<ApiEnvelope> {
        let request = ApiRequest::post(CONTACT_PATH)
            .json_body(message)
            .map_err(|e| crate::GatewayError::Decode(e.to_string()))?
            .anonymous();
        self.gateway.send(request).await?.json()
    }

    /// Country information for the caller's IP address.
    ///
    /// `requested_info` defaults to `country,countryCode` and `language` to the
    /// client's configured language.
    pub async fn geolocation(
        &self,
        requested_info: Option<&str>,
        language: Option<&str>,
    ) -> GatewayResult<Value> {
        let request = ApiRequest::get(GEOLOCATION_PATH)
            .query(
                "requested_info",
                requested_info.unwrap_or(DEFAULT_GEOLOCATION_FIELDS),
            )
            .query("selected_language", language.unwrap_or(&self.language))
            .anonymous();
        Ok(self.gateway.send(request).await?.body)
    }

    pub async fn health(&self) -> GatewayResult<Value> {
        Ok(self.gateway.send(ApiRequest::get(HEALTH_PATH).anonymous()).await?.body)
    }

    pub async fn info(&self) -> GatewayResult<Value> {
        Ok(self.gateway.send(ApiRequest::get(INFO_PATH).anonymous()).await?.body)
    }
}
