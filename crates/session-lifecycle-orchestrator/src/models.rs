//! Request and response bodies of the account endpoints.

use leaguer_config_and_utils::SocialProviders;
use leaguer_storage::{CachedUser, TokenPair};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const SIGN_IN_PATH: &str = "/accounts/sign-in/";
pub const SOCIAL_SIGN_IN_PATH: &str = "/accounts/sign-in-third-party/";
pub const UPDATE_PROFILE_PATH: &str = "/accounts/update-profile/";
pub const PASSWORD_RESET_PATH: &str = "/accounts/password-reset/";
pub const VERIFICATION_EMAIL_PATH: &str = "/accounts/send-verification-email-link/";
pub const LOGOUT_PATH: &str = "/accounts/logout/";

/// Username-or-email plus password.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email_or_username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email_or_username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email_or_username: email_or_username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email_or_username", &self.email_or_username)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Facebook,
    Apple,
}

impl SocialProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialProvider::Google => "google",
            SocialProvider::Facebook => "facebook",
            SocialProvider::Apple => "apple",
        }
    }

    pub fn is_enabled(&self, providers: &SocialProviders) -> bool {
        match self {
            SocialProvider::Google => providers.google,
            SocialProvider::Facebook => providers.facebook,
            SocialProvider::Apple => providers.apple,
        }
    }
}

impl fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocialProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(SocialProvider::Google),
            "facebook" => Ok(SocialProvider::Facebook),
            "apple" => Ok(SocialProvider::Apple),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Platform the social sign-in happened on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientPlatform {
    #[default]
    Web,
    Android,
    Ios,
}

/// Identity token obtained from a third-party provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct SocialLoginRequest {
    pub email: String,
    pub id_token: String,
    #[serde(rename = "type_third_party")]
    pub provider: SocialProvider,
    #[serde(rename = "from_platform")]
    pub platform: ClientPlatform,
}

impl fmt::Debug for SocialLoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocialLoginRequest")
            .field("email", &self.email)
            .field("id_token", &"[redacted]")
            .field("provider", &self.provider)
            .field("platform", &self.platform)
            .finish()
    }
}

/// Successful sign-in body.
#[derive(Deserialize)]
pub(crate) struct AuthResponse {
    pub user: CachedUser,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthResponse {
    pub fn tokens(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// Profile fields to change. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_birthday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_language: Option<String>,
    /// Anything else the backend accepts.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of the update-profile endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    pub user: CachedUser,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub wrong_password: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProfileResponse {
    /// Tokens issued after a password change. Both halves must be present.
    pub fn rotated_tokens(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(TokenPair::new(access.clone(), refresh.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_social_request_wire_names() {
        let request = SocialLoginRequest {
            email: "fan@leaguer.app".into(),
            id_token: "id-token".into(),
            provider: SocialProvider::Google,
            platform: ClientPlatform::Ios,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type_third_party"], "google");
        assert_eq!(value["from_platform"], "ios");
        assert!(!format!("{:?}", request).contains("id-token"));
    }

    #[test]
    fn test_provider_parsing_and_flags() {
        assert_eq!("Apple".parse::<SocialProvider>().unwrap(), SocialProvider::Apple);
        assert!("myspace".parse::<SocialProvider>().is_err());

        let providers = SocialProviders {
            google: true,
            facebook: false,
            apple: true,
        };
        assert!(SocialProvider::Google.is_enabled(&providers));
        assert!(!SocialProvider::Facebook.is_enabled(&providers));
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let mut update = ProfileUpdate {
            first_name: Some("Ada".into()),
            ..Default::default()
        };
        update.extra.insert("user_initials_bg_color".into(), json!("#123456"));

        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({ "first_name": "Ada", "user_initials_bg_color": "#123456" })
        );
    }

    #[test]
    fn test_profile_response_rotation_requires_both_tokens() {
        let body = json!({ "user": { "id": 7 }, "access_token": "a", "refresh_token": null });
        let response: ProfileResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.rotated_tokens(), None);
        assert!(!response.wrong_password);

        let body = json!({ "user": { "id": 7 }, "access_token": "a", "refresh_token": "r" });
        let response: ProfileResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.rotated_tokens(), Some(TokenPair::new("a", "r")));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = LoginCredentials::new("fan", "hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
