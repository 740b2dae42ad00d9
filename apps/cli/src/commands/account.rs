//! Profile and account recovery commands.

use super::{auth_failure, prompt_secret, Client};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::json;
use session_lifecycle_orchestrator::ProfileUpdate;

/// Print the cached user.
pub async fn whoami(client: &Client, format: &OutputFormat) -> Result<()> {
    let Some(user) = client.session.orchestrator.current_user() else {
        anyhow::bail!("Not logged in. Run 'leaguer login' first");
    };

    match format {
        OutputFormat::Text => {
            output::print_heading(&user.display_name());
            output::print_row("ID", &user.id);
            output::print_row("Username", user.username.as_deref().unwrap_or("-"));
            output::print_row("Email", user.email.as_deref().unwrap_or("-"));
            output::print_row(
                "Email verified",
                match user.is_email_validated {
                    Some(true) => "yes",
                    Some(false) => "no",
                    None => "unknown",
                },
            );
            output::print_row("Language", user.current_language.as_deref().unwrap_or("-"));
        }
        OutputFormat::Json => output::print_json(&user),
    }
    Ok(())
}

/// Send profile changes and print the updated user.
pub async fn update_profile(
    client: &Client,
    update: ProfileUpdate,
    format: &OutputFormat,
) -> Result<()> {
    if update == ProfileUpdate::default() {
        anyhow::bail!("Nothing to update; pass at least one field");
    }

    let user = client
        .session
        .orchestrator
        .update_profile(&update)
        .await
        .map_err(auth_failure)?;

    match format {
        OutputFormat::Text => println!("Profile updated for {}", user.display_name()),
        OutputFormat::Json => output::print_json(&json!({ "status": "success", "user": user })),
    }
    Ok(())
}

/// Prompt for the current and new password and change it.
pub async fn change_password(client: &Client, format: &OutputFormat) -> Result<()> {
    if !client.session.orchestrator.is_authenticated() {
        anyhow::bail!("Not logged in. Run 'leaguer login' first");
    }

    let current = prompt_secret("Current password: ", "Current password")?;
    let new = prompt_secret("New password: ", "New password")?;
    let confirm = prompt_secret("Confirm new password: ", "Password confirmation")?;
    if new != confirm {
        anyhow::bail!("Passwords do not match");
    }

    client
        .session
        .orchestrator
        .change_password(&current, &new)
        .await
        .map_err(auth_failure)?;
    output::print_success("Password changed", format);
    Ok(())
}

/// Request a password reset link.
pub async fn reset_password(client: &Client, identifier: &str, format: &OutputFormat) -> Result<()> {
    let message = client
        .session
        .orchestrator
        .request_password_reset(identifier)
        .await
        .map_err(auth_failure)?;
    output::print_success(
        message.as_deref().unwrap_or("Password reset link sent"),
        format,
    );
    Ok(())
}

/// Resend the email verification link.
pub async fn verify_email(
    client: &Client,
    user_id: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let message = client
        .session
        .orchestrator
        .send_verification_email(user_id)
        .await
        .map_err(auth_failure)?;
    output::print_success(
        message.as_deref().unwrap_or("Verification email sent"),
        format,
    );
    Ok(())
}
