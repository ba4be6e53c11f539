//! Administrators and their notification preferences.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use fault::{Classification, Severity};
use serde::{Deserialize, Serialize};

/// Delivery channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Chat,
    Webhook,
    InApp,
}

impl Channel {
    /// Get the display name for this channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Chat => "chat",
            Self::Webhook => "webhook",
            Self::InApp => "in_app",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local time-of-day window during which only critical alerts go out.
///
/// `start > end` means the window wraps past midnight (e.g. 22:00 to 06:00).
/// `start == end` is an empty window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
}

impl QuietHours {
    /// Whether the given instant falls inside the window, evaluated in the
    /// administrator's own timezone.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone).time();
        if self.start <= self.end {
            self.start <= local && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }
}

/// Which faults an administrator wants to hear about, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Allowed channels, in preference order.
    pub channels: Vec<Channel>,
    /// Severities the administrator wants to be told about.
    pub severities: Vec<Severity>,
    /// Module filter; empty means all modules.
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,
}

impl NotificationPreferences {
    /// Preferences that accept every severity on the given channels.
    #[must_use]
    pub fn all_severities(channels: Vec<Channel>) -> Self {
        Self {
            channels,
            severities: vec![
                Severity::Low,
                Severity::Medium,
                Severity::High,
                Severity::Critical,
            ],
            modules: Vec::new(),
            quiet_hours: None,
        }
    }

    /// Whether a fault with this classification passes the severity and
    /// module filters.
    #[must_use]
    pub fn accepts(&self, classification: &Classification) -> bool {
        self.severities.contains(&classification.severity)
            && (self.modules.is_empty() || self.modules.contains(&classification.module))
    }

    /// Whether quiet hours suppress delivery at the given instant.
    ///
    /// Critical faults are never suppressed.
    #[must_use]
    pub fn quiet_at(&self, at: DateTime<Utc>, severity: Severity) -> bool {
        severity != Severity::Critical
            && self
                .quiet_hours
                .as_ref()
                .is_some_and(|window| window.contains(at))
    }
}

/// A registered administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Administrator {
    pub id: String,
    pub name: String,
    /// Required contact address.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub preferences: NotificationPreferences,
}

impl Administrator {
    /// Build an active administrator with the given id and email, accepting
    /// everything over email.
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            email: email.into(),
            phone: None,
            chat_handle: None,
            webhook_url: None,
            role: "admin".to_string(),
            is_active: true,
            preferences: NotificationPreferences::all_severities(vec![Channel::Email]),
        }
    }

    #[must_use]
    pub fn with_preferences(mut self, preferences: NotificationPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn with_chat_handle(mut self, handle: impl Into<String>) -> Self {
        self.chat_handle = Some(handle.into());
        self
    }

    #[must_use]
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
