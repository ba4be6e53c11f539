//! Persistent and external log backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::entry::LogEntry;
use crate::error::SinkError;
use crate::query::LogQuery;

/// Persistent store for log entries.
///
/// The production implementation lives in the application and wraps the
/// relational backend; this crate ships [`MemoryStore`] for development and
/// tests.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist a batch of entries.
    async fn insert_many(&self, entries: &[LogEntry]) -> Result<(), SinkError>;

    /// Query persisted entries. Filtering only; the sink sorts and paginates.
    async fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>, SinkError>;

    /// Delete entries older than the cutoff, returning how many went away.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError>;
}

/// In-memory log store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert_many(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
        self.entries.lock().await.extend_from_slice(entries);
        Ok(())
    }

    async fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>, SinkError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().filter(|e| query.matches(e)).cloned().collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SinkError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.logged_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

/// Client for an external logging endpoint.
///
/// Disabled entirely unless both the endpoint URL and the API key are
/// configured; the sink simply does not construct one in that case.
pub struct ExternalLogClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl ExternalLogClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// POST a batch of entries to the endpoint.
    pub async fn post(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
        debug!(count = entries.len(), "Shipping log entries to external endpoint");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(entries)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::ExternalStatus {
                status: response.status().as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::RequestMeta;
    use fault::{classify, Fault};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(code: &str) -> LogEntry {
        let fault = Fault::new(code, "m");
        let classification = classify(&fault);
        LogEntry::new(fault, classification, RequestMeta::default())
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.insert_many(&[entry("A"), entry("B")]).await.unwrap();
        assert_eq!(store.len().await, 2);

        let found = store.query(&LogQuery::default()).await.unwrap();
        assert_eq!(found.len(), 2);

        let removed = store
            .delete_older_than(Utc::now() + chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_external_client_posts_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logs"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ExternalLogClient::new(format!("{}/logs", server.uri()), "secret");
        client.post(&[entry("A")]).await.unwrap();
    }

    #[tokio::test]
    async fn test_external_client_surfaces_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ExternalLogClient::new(server.uri(), "secret");
        let err = client.post(&[entry("A")]).await.unwrap_err();
        assert!(matches!(err, SinkError::ExternalStatus { status: 503 }));
    }
}
