//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur inside a channel sender.
///
/// These never cross the dispatcher boundary: senders convert them into
/// failed delivery results.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Channel is not configured
    #[error("channel not configured: {0}")]
    NotConfigured(String),

    /// The administrator has no contact address for this channel
    #[error("missing contact address: {0}")]
    MissingContact(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Template rendering error
    #[error("template rendering failed: {0}")]
    Template(#[from] handlebars::RenderError),
}
