//! Notification channel implementations.

pub mod gateway;
pub mod in_app;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::admin::{Administrator, Channel};

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

/// Outcome of one delivery attempt to one administrator over one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub admin_id: String,
    pub channel: Channel,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryResult {
    #[must_use]
    pub fn delivered(admin: &Administrator, channel: Channel, message_id: Option<String>) -> Self {
        Self {
            admin_id: admin.id.clone(),
            channel,
            success: true,
            message_id,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(admin_id: impl Into<String>, channel: Channel, error: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
            channel,
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }

    /// The result recorded when an administrator's rate limit is exhausted.
    #[must_use]
    pub fn rate_limited(admin_id: impl Into<String>, channel: Channel) -> Self {
        Self::failed(admin_id, channel, "rate limited")
    }
}

/// Trait for notification channel senders (email gateway, webhook, etc.).
///
/// Senders never error outward: a missing contact address or an HTTP failure
/// is a normal failed [`DeliveryResult`], not an exception. The dispatcher
/// relies on this to stay crash-free no matter what a channel does.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Which channel this sender serves.
    fn channel(&self) -> Channel;

    /// Deliver a message to one administrator.
    async fn deliver(&self, admin: &Administrator, message: &Message) -> DeliveryResult;
}
