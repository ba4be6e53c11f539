//! Error types for the log sink.

use thiserror::Error;

/// Errors raised by log stores and the external logging endpoint.
///
/// These never cross the sink boundary into the original fault's call path;
/// they are caught by [`crate::LogSink::flush`] and turned into a re-queue
/// plus a console diagnostic.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The persistent store rejected a write or query.
    #[error("log store failure: {0}")]
    Store(String),

    /// HTTP request to the external endpoint failed.
    #[error("external endpoint request failed: {0}")]
    External(#[from] reqwest::Error),

    /// The external endpoint answered with a non-success status.
    #[error("external endpoint returned {status}")]
    ExternalStatus { status: u16 },
}
