//! In-app notification channel.
//!
//! Delivers into an in-memory inbox the application surfaces to signed-in
//! administrators. Also doubles as the capture channel in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::admin::{Administrator, Channel};
use crate::channels::{ChannelSender, DeliveryResult, Message};

/// One stored in-app notification.
#[derive(Debug, Clone)]
pub struct InAppMessage {
    pub id: Uuid,
    pub admin_id: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// Sender writing into a shared inbox.
#[derive(Default)]
pub struct InAppSender {
    inbox: Mutex<Vec<InAppMessage>>,
}

impl InAppSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered to one administrator, oldest first.
    pub async fn inbox_for(&self, admin_id: &str) -> Vec<InAppMessage> {
        self.inbox
            .lock()
            .await
            .iter()
            .filter(|m| m.admin_id == admin_id)
            .cloned()
            .collect()
    }

    /// Total stored messages.
    pub async fn len(&self) -> usize {
        self.inbox.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inbox.lock().await.is_empty()
    }
}

#[async_trait]
impl ChannelSender for InAppSender {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn deliver(&self, admin: &Administrator, message: &Message) -> DeliveryResult {
        let stored = InAppMessage {
            id: Uuid::new_v4(),
            admin_id: admin.id.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            received_at: Utc::now(),
        };
        let id = stored.id;

        self.inbox.lock().await.push(stored);

        DeliveryResult::delivered(admin, Channel::InApp, Some(id.to_string()))
    }
}
