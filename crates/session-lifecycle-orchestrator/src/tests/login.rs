//! Password and social sign-in.

use super::harness::{json_body, sign_in_ok, MockReply, TestHarness};
use crate::{
    AuthError, AuthState, ClientPlatform, LoginCredentials, OrchestratorConfig,
    SocialLoginRequest, SocialProvider, MSG_LOGIN_REMEMBERED, MSG_LOGIN_SUCCESS, SIGN_IN_PATH,
    SOCIAL_SIGN_IN_PATH,
};
use leaguer_config_and_utils::SocialProviders;
use leaguer_storage::{StorageKeys, StorageTier};
use serde_json::json;
use session_token_gateway::{
    ErrorKind, TransportError, HEADER_DEVICE_ID, MSG_INVALID_CREDENTIALS, MSG_SESSION_EXPIRED,
};

fn google_request() -> SocialLoginRequest {
    SocialLoginRequest {
        email: "fan@leaguer.app".into(),
        id_token: "google-id-token".into(),
        provider: SocialProvider::Google,
        platform: ClientPlatform::Web,
    }
}

#[tokio::test]
async fn login_without_remember_me_stays_ephemeral() {
    let harness = TestHarness::new();

    let user = harness.sign_in(42, false).await;

    assert_eq!(user.id, "42");
    assert!(harness.orchestrator.is_authenticated());
    assert_eq!(harness.stored_access(StorageTier::Ephemeral).as_deref(), Some("access-1"));
    assert_eq!(
        harness
            .stored_in(StorageTier::Ephemeral, StorageKeys::REFRESH_TOKEN)
            .as_deref(),
        Some("refresh-1")
    );
    assert_eq!(harness.stored_user(StorageTier::Ephemeral).unwrap().id, "42");
    assert_eq!(harness.stored_access(StorageTier::Durable), None);
    assert_eq!(harness.stored_user(StorageTier::Durable), None);
    assert!(harness.notifier.contains(MSG_LOGIN_SUCCESS));
}

#[tokio::test]
async fn login_with_remember_me_is_durable() {
    let harness = TestHarness::new();

    harness.sign_in(42, true).await;

    assert_eq!(harness.stored_access(StorageTier::Durable).as_deref(), Some("access-1"));
    assert_eq!(harness.stored_access(StorageTier::Ephemeral), None);
    assert!(harness.notifier.contains(MSG_LOGIN_REMEMBERED));
}

#[tokio::test]
async fn login_sends_credentials_language_and_device_id() {
    let harness = TestHarness::new();
    harness.sign_in(42, false).await;

    let requests = harness.transport.requests_to(SIGN_IN_PATH);
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(
        json_body(request),
        json!({
            "email_or_username": "fan",
            "password": "secret",
            "selected_language": "en",
        })
    );
    assert_eq!(request.bearer_token(), None);
    assert_eq!(
        request.header(HEADER_DEVICE_ID),
        Some(harness.device.get_device_id().as_str())
    );
}

#[tokio::test]
async fn login_opens_channel_and_reports_states() {
    let harness = TestHarness::new();

    harness.sign_in(42, false).await;

    assert_eq!(harness.link.connects(), 1);
    assert_eq!(
        harness.states(),
        vec![AuthState::Authenticating, AuthState::Authenticated]
    );
}

#[tokio::test]
async fn cached_user_keeps_unknown_fields() {
    let harness = TestHarness::new();

    harness.sign_in(42, true).await;

    let user = harness.orchestrator.current_user().unwrap();
    assert_eq!(user.display_name(), "Sam");
    assert_eq!(user.extra["user_initials_bg_color"], "#336699");
}

#[tokio::test]
async fn channel_failure_does_not_fail_login() {
    let harness = TestHarness::new();
    harness.link.fail_connects();

    harness.sign_in(42, false).await;

    assert_eq!(harness.link.connects(), 1);
    assert!(harness.orchestrator.is_authenticated());
}

#[tokio::test]
async fn rejected_credentials_leave_session_anonymous() {
    let harness = TestHarness::new();
    harness.transport.queue(
        SIGN_IN_PATH,
        MockReply::Json(401, json!({ "message": "Invalid credentials", "success": false })),
    );

    let err = harness
        .orchestrator
        .login(&LoginCredentials::new("fan", "wrong"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Authentication(ref m) if m == "Invalid credentials"));
    assert_eq!(harness.orchestrator.state(), AuthState::Anonymous);
    assert_eq!(
        harness.states(),
        vec![AuthState::Authenticating, AuthState::Anonymous]
    );
    assert!(!harness.gateway.has_valid_token());
    assert_eq!(harness.link.connects(), 0);
    // Sign-in failures never try to refresh.
    assert_eq!(harness.transport.requests().len(), 1);
}

#[tokio::test]
async fn bare_unauthorized_sign_in_reports_invalid_credentials() {
    let harness = TestHarness::new();
    harness
        .transport
        .queue(SIGN_IN_PATH, MockReply::Json(401, json!({})));

    let err = harness
        .orchestrator
        .login(&LoginCredentials::new("fan", "wrong"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Authentication(ref m) if m == MSG_INVALID_CREDENTIALS));
    assert!(harness.notifier.contains(MSG_INVALID_CREDENTIALS));
    assert!(!harness.notifier.contains(MSG_SESSION_EXPIRED));
    assert_eq!(harness.orchestrator.state(), AuthState::Anonymous);
}

#[tokio::test]
async fn login_validation_errors_keep_fields() {
    let harness = TestHarness::new();
    harness.transport.queue(
        SIGN_IN_PATH,
        MockReply::Json(
            400,
            json!({ "message": "Check the form", "errors": { "password": ["This field is required."] } }),
        ),
    );

    let err = harness
        .orchestrator
        .login(&LoginCredentials::new("fan", ""), false)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.field_errors().unwrap()["password"],
        vec!["This field is required.".to_string()]
    );
}

#[tokio::test]
async fn network_failure_is_transient() {
    let harness = TestHarness::new();
    harness.transport.queue(
        SIGN_IN_PATH,
        MockReply::Fail(TransportError::Connect("connection refused".into())),
    );

    let err = harness
        .orchestrator
        .login(&LoginCredentials::new("fan", "secret"), false)
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(harness.orchestrator.state(), AuthState::Anonymous);
}

#[tokio::test]
async fn malformed_success_body_is_rejected() {
    let harness = TestHarness::new();
    harness.transport.queue(
        SIGN_IN_PATH,
        MockReply::Json(200, json!({ "success": true, "user": { "id": 1 } })),
    );

    let err = harness
        .orchestrator
        .login(&LoginCredentials::new("fan", "secret"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Decode(_)));
    assert_eq!(harness.orchestrator.state(), AuthState::Anonymous);
    assert!(!harness.gateway.has_valid_token());
}

#[tokio::test]
async fn social_login_is_always_durable() {
    let harness = TestHarness::new();
    harness
        .transport
        .queue(SOCIAL_SIGN_IN_PATH, sign_in_ok(9, "social-access", "social-refresh"));

    let user = harness.orchestrator.social_login(&google_request()).await.unwrap();

    assert_eq!(user.id, "9");
    assert!(harness.orchestrator.is_authenticated());
    assert_eq!(
        harness.stored_access(StorageTier::Durable).as_deref(),
        Some("social-access")
    );
    assert_eq!(harness.stored_access(StorageTier::Ephemeral), None);
    assert_eq!(harness.link.connects(), 1);

    let request = &harness.transport.requests_to(SOCIAL_SIGN_IN_PATH)[0];
    assert_eq!(
        json_body(request),
        json!({
            "email": "fan@leaguer.app",
            "id_token": "google-id-token",
            "type_third_party": "google",
            "from_platform": "web",
            "selected_language": "en",
        })
    );
}

#[tokio::test]
async fn disabled_provider_is_rejected_locally() {
    let mut config = OrchestratorConfig::new("fr");
    config.social_providers = SocialProviders {
        google: false,
        facebook: true,
        apple: true,
    };
    let harness = TestHarness::with_config(config);

    let err = harness.orchestrator.social_login(&google_request()).await.unwrap_err();

    assert!(matches!(err, AuthError::ProviderDisabled(SocialProvider::Google)));
    assert!(harness.transport.requests().is_empty());
    assert!(harness.states().is_empty());
}

#[tokio::test]
async fn signing_in_again_replaces_the_session() {
    let harness = TestHarness::new();
    harness.sign_in(42, true).await;

    harness
        .transport
        .queue(SIGN_IN_PATH, sign_in_ok(43, "access-2", "refresh-2"));
    harness
        .orchestrator
        .login(&LoginCredentials::new("other", "secret"), false)
        .await
        .unwrap();

    assert_eq!(harness.stored_access(StorageTier::Ephemeral).as_deref(), Some("access-2"));
    assert_eq!(harness.stored_access(StorageTier::Durable), None);
    assert_eq!(harness.stored_user(StorageTier::Durable), None);
    assert_eq!(harness.orchestrator.current_user().unwrap().id, "43");
}
