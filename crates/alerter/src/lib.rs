use crate::error::AlerterError;
use async_trait::async_trait;
use comfy_table::presets::ASCII_FULL_CONDENSED;
use comfy_table::{CellAlignment, Table};
use configuration::{HttpConfig, TelegramConfig};
use core_types::OverdueOrder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
pub mod error;

/// Title of the delivery alert message.
pub const OVERDUE_ALERT_TITLE: &str = "Delivery deadline missed";

/// Somewhere a formatted alert can be delivered.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Sends one HTML-formatted message.
    async fn send_html(&self, message: &str) -> Result<(), AlerterError>;
}

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// The envelope every Telegram Bot API response is wrapped in.
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    api_base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`, failing if the token or chat_id is missing.
    pub fn new(config: &TelegramConfig, http: &HttpConfig) -> Result<Self, AlerterError> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            return Err(AlerterError::NotConfigured);
        }
        Ok(Self {
            client: Client::builder().timeout(http.timeout()).build()?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl MessageSink for TelegramAlerter {
    async fn send_html(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base_url, self.token);

        let payload = SendMessagePayload { chat_id: &self.chat_id, text: message, parse_mode: "HTML" };

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to decode error response".to_string());

        let envelope = serde_json::from_str::<TelegramResponse>(&body).ok();
        let error = match envelope {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => {
                tracing::debug!(chat_id = %self.chat_id, "Telegram message delivered.");
                return Ok(());
            }
            Some(TelegramResponse { description: Some(description), .. }) => AlerterError::ApiError(description),
            _ => AlerterError::ApiError(format!("{status}: {body}")),
        };
        tracing::warn!(%status, error = %error, "Telegram rejected the message.");
        Err(error)
    }
}

/// Renders overdue orders as a two-column plain-text table, in the given order.
pub fn format_overdue_table(orders: &[OverdueOrder]) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL_CONDENSED).set_header(vec!["Order ID", "Days overdue"]);
    for order in orders {
        table.add_row(vec![order.order_id.clone(), order.days_overdue.to_string()]);
    }
    if let Some(column) = table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Left);
    }
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Left);
    }
    table.to_string()
}

/// Builds the HTML alert listing `orders` (expected most overdue first).
pub fn overdue_alert_message(orders: &[OverdueOrder]) -> String {
    format!(
        "<b>{}</b>\n\n<pre>{}</pre>",
        OVERDUE_ALERT_TITLE,
        escape_html(&format_overdue_table(orders))
    )
}

/// Escapes the characters Telegram's HTML parse mode treats specially.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overdue(order_id: &str, days_overdue: i64) -> OverdueOrder {
        OverdueOrder { order_id: order_id.to_string(), days_overdue }
    }

    #[test]
    fn table_keeps_the_given_order() {
        let table = format_overdue_table(&[overdue("A-17", 5), overdue("B-3", 1)]);

        let a = table.find("A-17").unwrap();
        let b = table.find("B-3").unwrap();
        assert!(table.find("Order ID").unwrap() < a);
        assert!(a < b);
        assert!(table.contains('5'));
    }

    #[test]
    fn message_is_titled_and_preformatted() {
        let message = overdue_alert_message(&[overdue("1249708", 3)]);

        assert!(message.starts_with("<b>Delivery deadline missed</b>\n\n<pre>"));
        assert!(message.ends_with("</pre>"));
        assert!(message.contains("1249708"));
    }

    #[test]
    fn order_ids_are_html_escaped() {
        let message = overdue_alert_message(&[overdue("<x&y>", 2)]);
        assert!(message.contains("&lt;x&amp;y&gt;"));
        assert!(!message.contains("<x&y>"));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = TelegramConfig::default();
        assert!(matches!(
            TelegramAlerter::new(&config, &HttpConfig::default()),
            Err(AlerterError::NotConfigured)
        ));
    }
}
