//! Live channel commands.

use super::Client;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use live_session_channel::{ChannelMessage, ConnectionState, Subscription};
use serde_json::Value;
use tracing::info;

fn require_login(client: &Client) -> Result<()> {
    if client.session.orchestrator.is_authenticated() {
        Ok(())
    } else {
        anyhow::bail!("Not logged in. Run 'leaguer login --remember' first")
    }
}

fn print_message(message: &ChannelMessage, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            let at = DateTime::parse_from_rfc3339(&message.timestamp)
                .map(|ts| ts.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|_| message.timestamp.clone());
            println!("[{}] {} {}", at, message.message_type, message.data);
        }
        OutputFormat::Json => output::print_json(message),
    }
}

fn print_state(state: &ConnectionState) {
    if state.is_connected {
        eprintln!("-- connected");
    } else if state.is_connecting {
        eprintln!("-- connecting...");
    } else if let Some(error) = &state.error {
        eprintln!("-- {} (reconnect attempts: {})", error, state.reconnect_attempts);
    }
}

/// Print inbound live messages until interrupted.
pub async fn listen(client: &Client, types: &[String], format: &OutputFormat) -> Result<()> {
    require_login(client)?;
    let channel = &client.session.channel;
    let format = *format;

    let mut subscriptions: Vec<Subscription> = Vec::new();
    if types.is_empty() {
        subscriptions.push(channel.on_any_message(move |m| print_message(m, format)));
    } else {
        for message_type in types {
            subscriptions.push(channel.on_message(message_type, move |m| print_message(m, format)));
        }
    }
    if matches!(format, OutputFormat::Text) {
        subscriptions.push(channel.on_connection_state_change(print_state));
    }

    channel
        .connect()
        .await
        .context("Failed to open the live channel")?;
    info!(types = ?types, "Listening for live messages");
    if matches!(format, OutputFormat::Text) {
        eprintln!("Listening. Press Ctrl-C to stop.");
    }

    tokio::signal::ctrl_c().await?;

    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    channel.disconnect();
    Ok(())
}

/// Send one message over the live channel.
pub async fn send(
    client: &Client,
    message_type: &str,
    data: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    require_login(client)?;

    let data: Value = match data {
        Some(raw) => serde_json::from_str(raw).context("--data must be a JSON object")?,
        None => Value::Object(Default::default()),
    };
    if !data.is_object() {
        anyhow::bail!("--data must be a JSON object");
    }

    let channel = &client.session.channel;
    channel
        .connect()
        .await
        .context("Failed to open the live channel")?;
    let sent = channel.send(message_type, data).await;
    channel.disconnect();
    sent.context("Failed to send live message")?;

    output::print_success(&format!("Sent {}", message_type), format);
    Ok(())
}
