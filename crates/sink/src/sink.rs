//! The buffered log sink.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fault::{classify, Classification, Fault, Severity};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entry::{LogEntry, RequestMeta};
use crate::query::{LogQuery, LogStatistics};
use crate::store::{ExternalLogClient, LogStore};

/// Sink configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Mirror entries to the console sink (`tracing`) as they are logged.
    pub enable_console_logging: bool,
    /// Flush entries to the persistent store.
    pub enable_database_logging: bool,
    /// Ship entries to the external logging endpoint.
    pub enable_external_logging: bool,
    /// Entries below this severity are dropped at the door.
    pub min_level: Severity,
    /// In-memory buffer bound; the oldest entry is evicted past this.
    pub max_entries: usize,
    /// Retention applied by [`LogSink::cleanup`].
    pub retention_days: i64,
    /// Periodic flush interval.
    pub flush_interval: std::time::Duration,
    /// External endpoint URL. Ignored unless the API key is also set.
    pub external_endpoint: Option<String>,
    /// External endpoint API key. Ignored unless the URL is also set.
    pub external_api_key: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enable_console_logging: true,
            enable_database_logging: true,
            enable_external_logging: false,
            min_level: Severity::Low,
            max_entries: 1000,
            retention_days: 30,
            flush_interval: std::time::Duration::from_secs(30),
            external_endpoint: None,
            external_api_key: None,
        }
    }
}

/// Callback invoked when a critical fault is logged via
/// [`LogSink::log_critical`].
///
/// The sink cannot depend on the notification dispatcher (the dependency
/// spine runs the other way), so the pipeline wires the dispatcher's
/// immediate-notify path in through this hook.
#[async_trait]
pub trait CriticalHook: Send + Sync {
    async fn on_critical(&self, fault: &Fault, classification: &Classification);
}

/// Buffered, periodically flushed fault log.
pub struct LogSink {
    config: SinkConfig,
    buffer: Mutex<VecDeque<LogEntry>>,
    store: Option<Arc<dyn LogStore>>,
    external: Option<ExternalLogClient>,
    critical_hook: RwLock<Option<Arc<dyn CriticalHook>>>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl LogSink {
    /// Create a sink over the given persistent store.
    ///
    /// The external client is only constructed when external logging is
    /// enabled and both the endpoint and key are configured.
    #[must_use]
    pub fn new(config: SinkConfig, store: Option<Arc<dyn LogStore>>) -> Self {
        let external = if config.enable_external_logging {
            match (&config.external_endpoint, &config.external_api_key) {
                (Some(endpoint), Some(key)) => Some(ExternalLogClient::new(endpoint, key)),
                _ => {
                    warn!("External logging enabled but endpoint or API key missing, disabling");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            buffer: Mutex::new(VecDeque::new()),
            store,
            external,
            critical_hook: RwLock::new(None),
            flush_task: Mutex::new(None),
        }
    }

    /// Install the critical-notification hook.
    pub async fn set_critical_hook(&self, hook: Arc<dyn CriticalHook>) {
        *self.critical_hook.write().await = Some(hook);
    }

    /// The sink's configuration.
    #[must_use]
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Log a fault.
    ///
    /// Classifies the fault if unclassified, buffers the entry, mirrors it to
    /// the console sink, and flushes immediately when the resolved severity is
    /// critical. Returns the entry id, or `None` when the fault falls below
    /// the configured minimum level.
    pub async fn log(&self, fault: Fault, meta: RequestMeta) -> Option<Uuid> {
        let classification = classify(&fault);
        if classification.severity < self.config.min_level {
            return None;
        }

        let entry = LogEntry::new(fault, classification, meta);
        let id = entry.id;

        if self.config.enable_console_logging {
            mirror_to_console(&entry);
        }

        let is_critical = entry.classification.severity == Severity::Critical;
        {
            let mut buffer = self.buffer.lock().await;
            buffer.push_back(entry);
            while buffer.len() > self.config.max_entries {
                buffer.pop_front();
            }
        }

        if is_critical {
            self.flush().await;
        }

        Some(id)
    }

    /// Log a fault as critical, regardless of its own classification, and
    /// fire the critical hook.
    ///
    /// The hook call is a belt-and-suspenders measure independent of the
    /// orchestrator's own critical path.
    pub async fn log_critical(&self, fault: Fault, meta: RequestMeta) -> Option<Uuid> {
        let fault = Fault {
            severity: Some(Severity::Critical),
            ..fault
        };
        let classification = classify(&fault);

        let id = self.log(fault.clone(), meta).await;

        let hook = self.critical_hook.read().await.clone();
        if let Some(hook) = hook {
            hook.on_critical(&fault, &classification).await;
        }

        id
    }

    /// Drain the buffer to the configured backends.
    ///
    /// A failed persistent write re-queues the drained entries at the front
    /// of the buffer, ahead of anything logged in the meantime, so relative
    /// chronological order survives. Never returns an error.
    pub async fn flush(&self) {
        // Nowhere to drain into: leave entries buffered (bounded by
        // `max_entries`) so queries still see them.
        let store_configured = self.config.enable_database_logging && self.store.is_some();
        if !store_configured && self.external.is_none() {
            return;
        }

        let drained: Vec<LogEntry> = {
            let mut buffer = self.buffer.lock().await;
            buffer.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }

        let mut persisted = !store_configured;

        if store_configured {
            if let Some(store) = &self.store {
                match store.insert_many(&drained).await {
                    Ok(()) => persisted = true,
                    Err(e) => {
                        error!(
                            error = %e,
                            count = drained.len(),
                            "Log flush to persistent store failed, re-queueing entries"
                        );
                    }
                }
            }
        }

        if let Some(external) = &self.external {
            if let Err(e) = external.post(&drained).await {
                // The external endpoint is not the system of record; only
                // re-queue when nothing else holds the entries.
                error!(error = %e, "Log flush to external endpoint failed");
                if !store_configured {
                    persisted = false;
                }
            }
        }

        if persisted {
            debug!(count = drained.len(), "Flushed log entries");
        } else {
            let mut buffer = self.buffer.lock().await;
            for entry in drained.into_iter().rev() {
                buffer.push_front(entry);
            }
        }
    }

    /// Query buffered and persisted entries, newest first, paginated.
    pub async fn query(&self, query: &LogQuery) -> Vec<LogEntry> {
        let mut results: Vec<LogEntry> = Vec::new();

        if self.config.enable_database_logging {
            if let Some(store) = &self.store {
                match store.query(query).await {
                    Ok(persisted) => results.extend(persisted),
                    Err(e) => warn!(error = %e, "Log store query failed"),
                }
            }
        }

        {
            let buffer = self.buffer.lock().await;
            results.extend(buffer.iter().filter(|e| query.matches(e)).cloned());
        }

        query.paginate(&mut results);
        results
    }

    /// Statistics over entries logged within the given period.
    pub async fn statistics(&self, period: Duration) -> LogStatistics {
        let entries = self.query(&LogQuery::since(Utc::now() - period)).await;
        LogStatistics::compute(&entries)
    }

    /// Evict and delete entries older than the retention cutoff.
    ///
    /// Returns how many persisted entries were deleted.
    pub async fn cleanup(&self, retention_days: i64) -> u64 {
        let cutoff = Utc::now() - Duration::days(retention_days);

        {
            let mut buffer = self.buffer.lock().await;
            buffer.retain(|e| e.logged_at >= cutoff);
        }

        if let Some(store) = &self.store {
            match store.delete_older_than(cutoff).await {
                Ok(count) => {
                    if count > 0 {
                        info!(count, "Deleted expired log entries");
                    }
                    return count;
                }
                Err(e) => warn!(error = %e, "Log retention cleanup failed"),
            }
        }
        0
    }

    /// Number of entries currently buffered (not yet flushed).
    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Spawn the periodic flush task.
    pub async fn start_periodic_flush(self: &Arc<Self>) {
        let mut task = self.flush_task.lock().await;
        if task.is_some() {
            return;
        }

        let sink = Arc::clone(self);
        let interval = self.config.flush_interval;
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                sink.flush().await;
            }
        }));

        debug!(interval_secs = interval.as_secs(), "Periodic log flush started");
    }

    /// Cancel the flush task and perform one final flush.
    pub async fn shutdown(&self) {
        if let Some(task) = self.flush_task.lock().await.take() {
            task.abort();
        }
        self.flush().await;
    }
}

/// Mirror an entry to the console sink at a level matching its severity.
fn mirror_to_console(entry: &LogEntry) {
    let c = &entry.classification;
    match c.severity {
        Severity::Critical | Severity::High => error!(
            code = %entry.fault.code,
            severity = %c.severity,
            category = %c.category,
            module = %c.module,
            "{}",
            entry.fault.message
        ),
        Severity::Medium => warn!(
            code = %entry.fault.code,
            category = %c.category,
            module = %c.module,
            "{}",
            entry.fault.message
        ),
        Severity::Low => info!(
            code = %entry.fault.code,
            category = %c.category,
            module = %c.module,
            "{}",
            entry.fault.message
        ),
    }
}
