//! HTTP-gateway channels for email, SMS, and chat.
//!
//! Meridian delivers these through a messaging gateway service: one POST per
//! message with the recipient address taken from the administrator's contact
//! record. Which address is required depends on the channel, and a missing
//! address is a normal delivery failure.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::admin::{Administrator, Channel};
use crate::channels::{ChannelSender, DeliveryResult, Message};
use crate::error::ChannelError;

/// Sender for one gateway-backed channel kind.
pub struct GatewaySender {
    channel: Channel,
    endpoint: String,
    client: reqwest::Client,
}

impl GatewaySender {
    /// Build a sender for `Email`, `Sms`, or `Chat` against a gateway
    /// endpoint.
    ///
    /// # Panics
    ///
    /// Panics if called with a channel the gateway does not serve; the set of
    /// gateway channels is fixed at compile time in the pipeline wiring.
    #[must_use]
    pub fn new(channel: Channel, endpoint: impl Into<String>) -> Self {
        assert!(
            matches!(channel, Channel::Email | Channel::Sms | Channel::Chat),
            "gateway only serves email, sms, and chat"
        );
        Self {
            channel,
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// The contact address this channel requires, if the administrator has
    /// one on record.
    fn recipient<'a>(&self, admin: &'a Administrator) -> Option<&'a str> {
        match self.channel {
            Channel::Email => Some(admin.email.as_str()),
            Channel::Sms => admin.phone.as_deref(),
            Channel::Chat => admin.chat_handle.as_deref(),
            Channel::Webhook | Channel::InApp => None,
        }
    }

    async fn post(&self, payload: &GatewayPayload<'_>) -> Result<Option<String>, ChannelError> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;

        if response.status().is_success() {
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

#[async_trait]
impl ChannelSender for GatewaySender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn deliver(&self, admin: &Administrator, message: &Message) -> DeliveryResult {
        let Some(to) = self.recipient(admin) else {
            return DeliveryResult::failed(
                &admin.id,
                self.channel,
                format!("administrator has no {} address", self.channel),
            );
        };

        let payload = GatewayPayload {
            channel: self.channel.as_str(),
            to,
            subject: &message.subject,
            body: &message.body,
        };

        debug!(admin = %admin.id, channel = %self.channel, "Sending gateway notification");

        match self.post(&payload).await {
            Ok(message_id) => DeliveryResult::delivered(admin, self.channel, message_id),
            Err(e) => {
                warn!(
                    admin = %admin.id,
                    channel = %self.channel,
                    error = %e,
                    "Gateway delivery failed"
                );
                DeliveryResult::failed(&admin.id, self.channel, e.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GatewayPayload<'a> {
    channel: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> Message {
        Message {
            subject: "s".to_string(),
            body: "b".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sms_without_phone_is_failure() {
        let sender = GatewaySender::new(Channel::Sms, "http://gateway.invalid/send");
        let admin = Administrator::new("ops-1", "ops@example.com");

        let result = sender.deliver(&admin, &message()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no sms address"));
    }

    #[tokio::test]
    async fn test_email_uses_admin_address() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(
                serde_json::json!({"channel": "email", "to": "ops@example.com"}),
            ))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sender = GatewaySender::new(Channel::Email, server.uri());
        let admin = Administrator::new("ops-1", "ops@example.com");

        let result = sender.deliver(&admin, &message()).await;
        assert!(result.success);
    }

    #[test]
    #[should_panic(expected = "gateway only serves")]
    fn test_gateway_rejects_webhook_channel() {
        let _ = GatewaySender::new(Channel::Webhook, "http://gateway.invalid");
    }
}
