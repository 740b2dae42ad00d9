//! Sign-in, sign-out and status commands.

use super::{auth_failure, prompt, prompt_secret, Client};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use leaguer_storage::StorageTier;
use serde_json::json;
use session_lifecycle_orchestrator::{
    ClientPlatform, LoginCredentials, SocialLoginRequest, SocialProvider,
};

/// Login with email or username and password.
pub async fn login(
    client: &Client,
    identifier: Option<String>,
    remember: bool,
    format: &OutputFormat,
) -> Result<()> {
    let orchestrator = &client.session.orchestrator;

    if let Some(user) = orchestrator.current_user() {
        output::print_success(
            &format!("Already logged in as {}", user.display_name()),
            format,
        );
        return Ok(());
    }

    let identifier = match identifier {
        Some(identifier) => identifier,
        None => prompt("Email or username: ")?,
    };
    if identifier.is_empty() {
        anyhow::bail!("Email or username is required");
    }
    let password = prompt_secret("Password: ", "Password")?;

    if matches!(format, OutputFormat::Text) {
        println!("Logging in...");
    }

    let credentials = LoginCredentials::new(identifier, password);
    let user = orchestrator
        .login(&credentials, remember)
        .await
        .map_err(auth_failure)?;

    match format {
        OutputFormat::Text => {
            println!("Logged in as {}", user.display_name());
            if !remember {
                println!("Session not remembered; it ends when this command exits.");
            }
        }
        OutputFormat::Json => output::print_json(&json!({
            "status": "success",
            "remembered": remember,
            "user": user,
        })),
    }
    Ok(())
}

/// Login with a third-party identity token.
pub async fn social_login(
    client: &Client,
    provider: SocialProvider,
    email: String,
    id_token: String,
    platform: ClientPlatform,
    format: &OutputFormat,
) -> Result<()> {
    let request = SocialLoginRequest {
        email,
        id_token,
        provider,
        platform,
    };
    let user = client
        .session
        .orchestrator
        .social_login(&request)
        .await
        .map_err(auth_failure)?;

    match format {
        OutputFormat::Text => println!("Logged in with {} as {}", provider, user.display_name()),
        OutputFormat::Json => output::print_json(&json!({
            "status": "success",
            "provider": provider,
            "user": user,
        })),
    }
    Ok(())
}

/// Logout and clear session.
pub async fn logout(client: &Client, format: &OutputFormat) -> Result<()> {
    client
        .session
        .orchestrator
        .logout()
        .await
        .map_err(auth_failure)?;
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Show authentication status.
pub async fn status(client: &Client, format: &OutputFormat) -> Result<()> {
    let session = &client.session;
    let state = session.orchestrator.state();
    let user = session.orchestrator.current_user();
    let location = session.vault.token_location();
    let device_id = session.device.get_device_id();

    match format {
        OutputFormat::Text => {
            match &user {
                Some(user) => {
                    println!("Auth:     logged in");
                    println!("User:     {}", user.display_name());
                    println!("User ID:  {}", user.id);
                    println!("Storage:  {}", tier_label(location));
                }
                None => println!("Auth:     not logged in"),
            }
            println!("Device:   {}", device_id);
            println!("Backend:  {}", session.config.backend_url);
        }
        OutputFormat::Json => output::print_json(&json!({
            "state": state,
            "logged_in": state.is_authenticated(),
            "user_id": user.as_ref().map(|u| u.id.clone()),
            "storage": location,
            "device_id": device_id,
            "backend_url": session.config.backend_url,
        })),
    }
    Ok(())
}

fn tier_label(location: Option<StorageTier>) -> &'static str {
    match location {
        Some(StorageTier::Durable) => "remembered",
        Some(StorageTier::Ephemeral) => "this process only",
        None => "none",
    }
}
