//! Commands for the public endpoints.

use super::Client;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::Value;

fn print_value(value: &Value, format: &OutputFormat) {
    match (format, value) {
        (OutputFormat::Text, Value::Object(map)) => {
            for (key, value) in map {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                output::print_row(key, &text);
            }
        }
        _ => output::print_json(value),
    }
}

/// Check backend health.
pub async fn health(client: &Client, format: &OutputFormat) -> Result<()> {
    let body = client
        .session
        .public
        .health()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    print_value(&body, format);
    Ok(())
}

/// Show backend build information.
pub async fn info(client: &Client, format: &OutputFormat) -> Result<()> {
    let body = client
        .session
        .public
        .info()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    print_value(&body, format);
    Ok(())
}
