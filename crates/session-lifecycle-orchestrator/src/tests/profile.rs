//! Profile updates, password changes and account recovery.

use super::harness::{json_body, MockReply, TestHarness};
use crate::{
    AuthError, ProfileUpdate, MSG_PASSWORD_CHANGED, MSG_WRONG_PASSWORD, PASSWORD_RESET_PATH,
    UPDATE_PROFILE_PATH, VERIFICATION_EMAIL_PATH,
};
use leaguer_storage::{StorageKeys, StorageTier};
use serde_json::json;

fn profile_reply(first_name: &str, tokens: Option<(&str, &str)>, wrong_password: bool) -> MockReply {
    let (access, refresh) = match tokens {
        Some((access, refresh)) => (json!(access), json!(refresh)),
        None => (json!(null), json!(null)),
    };
    MockReply::Json(
        200,
        json!({
            "success": true,
            "message": "Your profile has been updated successfully.",
            "user": {
                "id": 42,
                "email": "fan@leaguer.app",
                "first_name": first_name,
                "is_email_validated": false
            },
            "access_token": access,
            "refresh_token": refresh,
            "wrong_password": wrong_password,
        }),
    )
}

#[tokio::test]
async fn update_profile_replaces_cached_user() {
    let harness = TestHarness::new();
    harness.sign_in(42, true).await;
    harness
        .transport
        .queue(UPDATE_PROFILE_PATH, profile_reply("Samantha", None, false));

    let update = ProfileUpdate {
        first_name: Some("Samantha".into()),
        ..Default::default()
    };
    let user = harness.orchestrator.update_profile(&update).await.unwrap();

    assert_eq!(user.first_name.as_deref(), Some("Samantha"));
    let cached = harness.orchestrator.current_user().unwrap();
    assert_eq!(cached.first_name.as_deref(), Some("Samantha"));
    // Replaced, not merged: fields the server dropped are gone.
    assert_eq!(cached.username, None);
    assert!(!cached.extra.contains_key("user_initials_bg_color"));
    assert_eq!(cached.is_email_validated, Some(false));

    let request = &harness.transport.requests_to(UPDATE_PROFILE_PATH)[0];
    assert_eq!(request.method, session_token_gateway::HttpMethod::Put);
    assert_eq!(request.bearer_token(), Some("access-1"));
    assert_eq!(json_body(request), json!({ "first_name": "Samantha" }));
}

#[tokio::test]
async fn profile_for_ephemeral_session_stays_ephemeral() {
    let harness = TestHarness::new();
    harness.sign_in(42, false).await;
    harness
        .transport
        .queue(UPDATE_PROFILE_PATH, profile_reply("Samantha", None, false));

    harness
        .orchestrator
        .update_profile(&ProfileUpdate::default())
        .await
        .unwrap();

    assert!(harness.stored_user(StorageTier::Ephemeral).is_some());
    assert_eq!(harness.stored_user(StorageTier::Durable), None);
}

#[tokio::test]
async fn update_profile_requires_session() {
    let harness = TestHarness::new();

    let err = harness
        .orchestrator
        .update_profile(&ProfileUpdate::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NotLoggedIn));
    assert!(harness.transport.requests().is_empty());
}

#[tokio::test]
async fn change_password_rotates_tokens_in_session_tier() {
    let harness = TestHarness::new();
    harness.sign_in(42, false).await;
    harness.transport.queue(
        UPDATE_PROFILE_PATH,
        profile_reply("Sam", Some(("access-2", "refresh-2")), false),
    );

    harness
        .orchestrator
        .change_password("secret", "new-secret")
        .await
        .unwrap();

    assert_eq!(harness.stored_access(StorageTier::Ephemeral).as_deref(), Some("access-2"));
    assert_eq!(
        harness
            .stored_in(StorageTier::Ephemeral, StorageKeys::REFRESH_TOKEN)
            .as_deref(),
        Some("refresh-2")
    );
    assert_eq!(harness.stored_access(StorageTier::Durable), None);
    assert!(harness.notifier.contains(MSG_PASSWORD_CHANGED));

    let request = &harness.transport.requests_to(UPDATE_PROFILE_PATH)[0];
    assert_eq!(
        json_body(request),
        json!({
            "current_password": "secret",
            "new_password": "new-secret",
            "update_password": true,
        })
    );
}

#[tokio::test]
async fn wrong_current_password_is_a_field_error() {
    let harness = TestHarness::new();
    harness.sign_in(42, true).await;
    harness
        .transport
        .queue(UPDATE_PROFILE_PATH, profile_reply("Sam", None, true));

    let err = harness
        .orchestrator
        .change_password("not-it", "new-secret")
        .await
        .unwrap_err();

    assert_eq!(
        err.field_errors().unwrap()["current_password"],
        vec![MSG_WRONG_PASSWORD.to_string()]
    );
    // Old credentials are untouched and the session continues.
    assert_eq!(harness.stored_access(StorageTier::Durable).as_deref(), Some("access-1"));
    assert!(harness.orchestrator.is_authenticated());
    assert!(!harness.notifier.contains(MSG_PASSWORD_CHANGED));
}

#[tokio::test]
async fn profile_conflict_surfaces_as_client_error() {
    let harness = TestHarness::new();
    harness.sign_in(42, true).await;
    harness.transport.queue(
        UPDATE_PROFILE_PATH,
        MockReply::Json(
            409,
            json!({ "message": "Your profile could not be updated", "success": false }),
        ),
    );

    let err = harness
        .orchestrator
        .update_profile(&ProfileUpdate::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Client { status: Some(409), .. }));
    assert_eq!(err.to_string(), "Your profile could not be updated");
    assert_eq!(harness.orchestrator.current_user().unwrap().first_name.as_deref(), Some("Sam"));
}

#[tokio::test]
async fn password_reset_is_anonymous_and_stateless() {
    let harness = TestHarness::new();
    harness.transport.queue(
        PASSWORD_RESET_PATH,
        MockReply::Json(200, json!({ "success": true, "message": "Check your inbox" })),
    );

    let message = harness
        .orchestrator
        .request_password_reset("fan@leaguer.app")
        .await
        .unwrap();

    assert_eq!(message.as_deref(), Some("Check your inbox"));
    let request = &harness.transport.requests_to(PASSWORD_RESET_PATH)[0];
    assert_eq!(request.bearer_token(), None);
    assert_eq!(
        json_body(request),
        json!({ "email_or_username": "fan@leaguer.app", "selected_language": "en" })
    );
    assert!(harness.states().is_empty());
}

#[tokio::test]
async fn verification_email_defaults_to_cached_user() {
    let harness = TestHarness::new();
    harness.sign_in(42, true).await;
    harness.transport.queue(
        VERIFICATION_EMAIL_PATH,
        MockReply::Json(200, json!({ "success": true, "message": "Email sent" })),
    );

    let message = harness
        .orchestrator
        .send_verification_email(None)
        .await
        .unwrap();

    assert_eq!(message.as_deref(), Some("Email sent"));
    let request = &harness.transport.requests_to(VERIFICATION_EMAIL_PATH)[0];
    assert_eq!(
        json_body(request),
        json!({ "user_id": "42", "selected_language": "en" })
    );
}

#[tokio::test]
async fn verification_email_without_user_fails_locally() {
    let harness = TestHarness::new();

    let err = harness
        .orchestrator
        .send_verification_email(None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NotLoggedIn));
    assert!(harness.transport.requests().is_empty());
}
