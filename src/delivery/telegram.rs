//! Delivery through the Telegram Bot API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{error::DeliveryError, traits::DeliverySink};
use crate::{models::ChannelId, notification::Notification};

const FORBIDDEN: i64 = 403;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error_code: Option<i64>,
    description: Option<String>,
}

/// A `DeliverySink` posting HTML alerts with link previews disabled.
pub struct TelegramSink {
    client: Arc<ClientWithMiddleware>,
    api_url: Url,
    bot_token: String,
}

impl TelegramSink {
    /// Creates a sink that calls the Bot API at `api_url` with `bot_token`.
    pub fn new(client: Arc<ClientWithMiddleware>, api_url: Url, bot_token: String) -> Self {
        Self { client, api_url, bot_token }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url.as_str().trim_end_matches('/'), self.bot_token, method)
    }

    fn request(channel_id: ChannelId, notification: &Notification) -> (&'static str, Value) {
        match &notification.image {
            Some(image) => (
                "sendPhoto",
                json!({
                    "chat_id": channel_id,
                    "photo": image,
                    "caption": notification.text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            ),
            None => (
                "sendMessage",
                json!({
                    "chat_id": channel_id,
                    "text": notification.text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            ),
        }
    }
}

/// Maps an HTTP status and API body to a delivery outcome.
fn classify(status: StatusCode, body: Option<ApiResponse>) -> Result<(), DeliveryError> {
    let (ok, error_code, description) = match body {
        Some(body) => (body.ok, body.error_code, body.description),
        None => (false, None, None),
    };
    if status.is_success() && ok {
        return Ok(());
    }

    let description = description.unwrap_or_else(|| format!("HTTP {status}"));
    if status == StatusCode::FORBIDDEN || error_code == Some(FORBIDDEN) {
        Err(DeliveryError::PermanentlyUnreachable(description))
    } else {
        Err(DeliveryError::Transient(description))
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    #[tracing::instrument(skip(self, notification), fields(with_image = notification.image.is_some()), level = "debug")]
    async fn deliver(
        &self,
        channel_id: ChannelId,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let (method, payload) = Self::request(channel_id, notification);
        let response = self
            .client
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = response.status();
        let body = response.json::<ApiResponse>().await.ok();
        classify(status, body)
    }
}
