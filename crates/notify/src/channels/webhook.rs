//! Per-administrator webhook channel.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::admin::{Administrator, Channel};
use crate::channels::{ChannelSender, DeliveryResult, Message};
use crate::error::ChannelError;

/// Delivers notifications by POSTing JSON to each administrator's configured
/// webhook URL.
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<Option<String>, ChannelError> {
        let response = self.client.post(url).json(payload).send().await?;

        if response.status().is_success() {
            // Some receivers echo a message id; absence is fine.
            let message_id = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v["message_id"].as_str().map(str::to_string));
            Ok(message_id)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(ChannelError::Status { status, body })
        }
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn deliver(&self, admin: &Administrator, message: &Message) -> DeliveryResult {
        let Some(url) = &admin.webhook_url else {
            return DeliveryResult::failed(
                &admin.id,
                Channel::Webhook,
                "no webhook URL configured for administrator",
            );
        };

        let payload = WebhookPayload {
            subject: &message.subject,
            body: &message.body,
            admin_id: &admin.id,
        };

        debug!(admin = %admin.id, "Sending webhook notification");

        match self.post(url, &payload).await {
            Ok(message_id) => DeliveryResult::delivered(admin, Channel::Webhook, message_id),
            Err(e) => {
                warn!(admin = %admin.id, error = %e, "Webhook delivery failed");
                DeliveryResult::failed(&admin.id, Channel::Webhook, e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
    admin_id: &'a str,
}
