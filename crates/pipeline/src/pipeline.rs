//! The pipeline facade.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use fault::{classify, Classification, Fault, Faultlike, Severity};
use notify::{ChannelSender, DeliveryResult, Notifier, TemplateSet};
use recovery::{
    BreakerState, RecoveryContext, RecoveryOutcome, RecoveryRegistry, RecoveryStrategy,
    RetryExecutor, RetryableOperation,
};
use serde_json::Value;
use sink::{CriticalHook, LogSink, LogStore, RequestMeta};
use tracing::info;

use crate::config::PipelineConfig;
use crate::health::HealthReport;
use crate::stats::PipelineStatistics;

/// Bridges the sink's critical path into the dispatcher, independent of the
/// pipeline's own critical handling.
struct DispatcherHook {
    notifier: Arc<Notifier>,
}

#[async_trait]
impl CriticalHook for DispatcherHook {
    async fn on_critical(&self, fault: &Fault, _classification: &Classification) {
        self.notifier.notify_critical(fault, HashMap::new()).await;
    }
}

/// The fault pipeline: one per process, passed by reference into
/// request-handling code.
pub struct Pipeline {
    sink: Arc<LogSink>,
    notifier: Arc<Notifier>,
    registry: Arc<RecoveryRegistry>,
    retry: Option<Arc<dyn RetryExecutor>>,
    retry_policies: HashMap<String, recovery::RetryPolicy>,
    recovery_attempts: AtomicU64,
    recovery_successes: AtomicU64,
}

impl Pipeline {
    /// Wire the pipeline from configuration plus its collaborators: the
    /// persistent log store, the channel senders, and (optionally) the retry
    /// executor.
    pub async fn new(
        config: PipelineConfig,
        store: Option<Arc<dyn LogStore>>,
        senders: Vec<Arc<dyn ChannelSender>>,
        retry: Option<Arc<dyn RetryExecutor>>,
    ) -> Self {
        let sink = Arc::new(LogSink::new(config.logging.to_sink_config(), store));
        let notifier = Arc::new(Notifier::new(
            config.notifications.to_notifier_config(),
            senders,
            TemplateSet::new(config.templates),
            config.escalation_rules,
        ));

        for admin in config.administrators {
            notifier.register_admin(admin).await;
        }

        sink.set_critical_hook(Arc::new(DispatcherHook {
            notifier: Arc::clone(&notifier),
        }))
        .await;

        Self {
            sink,
            notifier,
            registry: Arc::new(RecoveryRegistry::new()),
            retry,
            retry_policies: config.retry_policies,
            recovery_attempts: AtomicU64::new(0),
            recovery_successes: AtomicU64::new(0),
        }
    }

    /// Start the periodic timers and hand the strategy mapping to the retry
    /// collaborator. Call once after registering strategies.
    pub async fn start(&self) {
        self.sink.start_periodic_flush().await;
        self.notifier.start_batch_timer().await;

        if let Some(retry) = &self.retry {
            retry.adopt_strategies(self.registry.all().await).await;
        }

        info!("Fault pipeline started");
    }

    /// The log sink.
    #[must_use]
    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// The notification dispatcher.
    #[must_use]
    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// The recovery registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RecoveryRegistry> {
        &self.registry
    }

    /// Register a recovery strategy for an error code.
    pub async fn register_strategy(
        &self,
        code: impl Into<String>,
        strategy: Arc<dyn RecoveryStrategy>,
    ) {
        self.registry.register(code, strategy).await;
    }

    // =========================================================================
    // End-to-end fault handling
    // =========================================================================

    /// Run an operation through the pipeline.
    ///
    /// On failure the fault is logged, recovery is attempted, administrators
    /// are notified, and the **original error is re-raised** to the caller.
    /// The pipeline augments; it never suppresses.
    pub async fn handle<T, E, F>(&self, operation_name: &str, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Faultlike,
    {
        match operation.await {
            Ok(value) => Ok(value),
            Err(error) => {
                let fault = error.to_fault().with_context("operation", operation_name);
                self.process_fault(fault).await;
                Err(error)
            }
        }
    }

    /// Log a fault without running an operation.
    ///
    /// Typed domain faults are additionally routed to the dispatcher; foreign
    /// errors are logged only.
    pub async fn log_only<E>(&self, error: &E, context: HashMap<String, Value>, meta: RequestMeta)
    where
        E: Faultlike,
    {
        let fault = error.to_fault().with_context_map(context);
        self.sink.log(fault.clone(), meta).await;

        if error.is_domain() {
            self.notifier.notify(&fault, HashMap::new(), false).await;
        }
    }

    /// Handle a fault as critical regardless of its own classification.
    ///
    /// Logs through the sink's critical path (which itself dispatches
    /// immediately via the hook), attempts recovery, and runs the
    /// dispatcher's immediate path. Rate limiting caps the combined fan-out.
    pub async fn handle_critical(
        &self,
        fault: &Fault,
        context: HashMap<String, Value>,
        meta: RequestMeta,
    ) -> Vec<DeliveryResult> {
        let fault = Fault {
            severity: Some(Severity::Critical),
            ..fault.clone().with_context_map(context)
        };

        self.sink.log_critical(fault.clone(), meta).await;
        let _ = self.try_recover(&fault).await;
        self.notifier.notify_critical(&fault, HashMap::new()).await
    }

    /// Mark an error code resolved, cancelling any pending escalation.
    pub async fn resolve(&self, code: &str) {
        self.notifier.resolve(code).await;
    }

    /// Classify, log, attempt recovery, and notify for one fault.
    async fn process_fault(&self, fault: Fault) {
        let classification = classify(&fault);
        self.sink.log(fault.clone(), RequestMeta::default()).await;

        let outcome = self.try_recover(&fault).await;

        if classification.severity == Severity::Critical {
            // Inherently critical: administrators hear about it even when
            // recovery made progress.
            self.notifier.notify_critical(&fault, HashMap::new()).await;
        } else if !outcome.resolved() {
            self.notifier.notify(&fault, HashMap::new(), false).await;
        }
    }

    /// Attempt recovery, keeping the success-rate counters.
    ///
    /// Faults with no registered strategy do not count as attempts.
    async fn try_recover(&self, fault: &Fault) -> RecoveryOutcome {
        if self.registry.get(&fault.code).await.is_none() {
            return RecoveryOutcome::unrecovered("no strategy registered");
        }

        self.recovery_attempts.fetch_add(1, Ordering::Relaxed);
        let outcome = self.registry.run(fault, &RecoveryContext::new()).await;

        if outcome.resolved() {
            self.recovery_successes.fetch_add(1, Ordering::Relaxed);
            self.notifier.resolve(&fault.code).await;
        }

        outcome
    }

    // =========================================================================
    // Retry collaborator
    // =========================================================================

    /// Execute an operation under the module's retry policy.
    ///
    /// Without a configured retry executor the operation runs exactly once.
    pub async fn execute_with_retry(
        &self,
        module: &str,
        operation_name: &str,
        operation: RetryableOperation,
    ) -> Result<Value, Fault> {
        let Some(retry) = &self.retry else {
            return operation().await;
        };

        let policy = self.retry_policies.get(module).cloned().unwrap_or_default();
        retry
            .execute_with_retry(operation_name, operation, &policy)
            .await
    }

    /// Breaker state for an operation, when a retry executor is configured.
    pub async fn breaker_state(&self, operation_name: &str) -> Option<BreakerState> {
        match &self.retry {
            Some(retry) => Some(retry.breaker_state(operation_name).await),
            None => None,
        }
    }

    /// Force a breaker closed, when a retry executor is configured.
    pub async fn reset_breaker(&self, operation_name: &str) {
        if let Some(retry) = &self.retry {
            retry.reset_breaker(operation_name).await;
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Probe each component and aggregate the results.
    ///
    /// A probe failure downgrades only its own component; probes never
    /// propagate errors.
    pub async fn health_status(&self) -> HealthReport {
        let mut issues = Vec::new();
        let mut failed_components = 0;

        // Log sink: attempt a trivial log, then look for back-pressure.
        let probe = Fault::new("HEALTH_PROBE", "pipeline health probe")
            .with_severity(Severity::Low)
            .with_module("system");
        self.sink.log(probe, RequestMeta::default()).await;
        if self.sink.buffered().await >= self.sink.config().max_entries {
            failed_components += 1;
            issues.push("log buffer is full; flushes may be failing".to_string());
        }

        // Dispatcher: test notification to the first registered administrator.
        if let Some(admin_id) = self.notifier.first_admin_id().await {
            let channel = self
                .notifier
                .get_admin(&admin_id)
                .await
                .and_then(|a| a.preferences.channels.first().copied());
            if let Some(channel) = channel {
                let result = self.notifier.test_notification(&admin_id, channel).await;
                if !result.success {
                    failed_components += 1;
                    issues.push(format!(
                        "test notification to {admin_id} over {channel} failed: {}",
                        result.error.unwrap_or_default()
                    ));
                }
            } else {
                failed_components += 1;
                issues.push(format!("administrator {admin_id} has no channels configured"));
            }
        } else {
            failed_components += 1;
            issues.push("no administrators registered".to_string());
        }

        // Recovery registry: non-empty check.
        if self.registry.is_empty().await {
            failed_components += 1;
            issues.push("no recovery strategies registered".to_string());
        }

        HealthReport::from_issues(failed_components, issues)
    }

    /// Merged statistics over the given period.
    pub async fn statistics(&self, period: Duration) -> PipelineStatistics {
        let logs = self.sink.statistics(period).await;
        let notifications = self.notifier.statistics(period).await;

        PipelineStatistics::merge(
            logs,
            notifications,
            self.recovery_attempts.load(Ordering::Relaxed),
            self.recovery_successes.load(Ordering::Relaxed),
        )
    }

    /// Flush logs, stop the timers, and drain pending batches, in that
    /// order. Each step is independently guarded; none of them can abort the
    /// others.
    pub async fn shutdown(&self) {
        self.sink.shutdown().await;
        self.notifier.shutdown().await;
        info!("Fault pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::{Administrator, Channel, InAppSender, NotificationPreferences};
    use recovery::FnStrategy;
    use sink::{LogQuery, MemoryStore};

    async fn test_pipeline() -> (Pipeline, Arc<InAppSender>) {
        let inbox = Arc::new(InAppSender::new());
        let pipeline = Pipeline::new(
            PipelineConfig::test(),
            Some(Arc::new(MemoryStore::new())),
            vec![inbox.clone() as Arc<dyn ChannelSender>],
            None,
        )
        .await;
        (pipeline, inbox)
    }

    fn in_app_admin(id: &str) -> Administrator {
        Administrator::new(id, format!("{id}@example.com"))
            .with_preferences(NotificationPreferences::all_severities(vec![Channel::InApp]))
    }

    #[tokio::test]
    async fn test_handle_reraises_original_error() {
        let (pipeline, _) = test_pipeline().await;

        let result: Result<(), Fault> = pipeline
            .handle("sync-invoices", async {
                Err(Fault::new("ACCOUNTING_SYNC_FAILED", "ledger rejected the batch"))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code, "ACCOUNTING_SYNC_FAILED");

        // The fault was logged on the way through.
        let entries = pipeline.sink().query(&LogQuery::default()).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fault.context["operation"], "sync-invoices");
    }

    #[tokio::test]
    async fn test_handle_success_touches_nothing() {
        let (pipeline, inbox) = test_pipeline().await;

        let result: Result<i32, Fault> = pipeline.handle("noop", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);

        assert!(pipeline.sink().query(&LogQuery::default()).await.is_empty());
        assert!(inbox.is_empty().await);
    }

    #[tokio::test]
    async fn test_log_only_foreign_error_is_not_notified() {
        let (pipeline, inbox) = test_pipeline().await;
        pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

        let foreign = anyhow::anyhow!("database connection refused");
        pipeline
            .log_only(&foreign, HashMap::new(), RequestMeta::default())
            .await;

        // Logged (classified high/database/unknown) but nobody pinged.
        let entries = pipeline.sink().query(&LogQuery::default()).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].classification.severity, Severity::High);
        assert!(inbox.is_empty().await);
    }

    #[tokio::test]
    async fn test_log_only_domain_fault_is_notified() {
        let (pipeline, inbox) = test_pipeline().await;
        pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

        let fault = Fault::new("HR_IMPORT_FAILED", "bad csv").with_severity(Severity::Critical);
        pipeline
            .log_only(&fault, HashMap::new(), RequestMeta::default())
            .await;

        assert_eq!(inbox.len().await, 1);
    }

    #[tokio::test]
    async fn test_recovered_fault_skips_notification() {
        let (pipeline, inbox) = test_pipeline().await;
        pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

        pipeline
            .register_strategy(
                "POS_SYNC_FAILED",
                Arc::new(FnStrategy::new(
                    |_| true,
                    |_, _| RecoveryOutcome::recovered("replayed against standby"),
                )),
            )
            .await;

        let result: Result<(), Fault> = pipeline
            .handle("pos-sync", async {
                Err(Fault::new("POS_SYNC_FAILED", "primary register offline")
                    .with_severity(Severity::High))
            })
            .await;
        assert!(result.is_err());

        assert!(inbox.is_empty().await);

        let stats = pipeline.statistics(Duration::hours(1)).await;
        assert_eq!(stats.recovery_attempts, 1);
        assert_eq!(stats.recovery_successes, 1);
        assert!((stats.recovery_success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_health_transitions() {
        let (pipeline, _) = test_pipeline().await;

        // No administrators, no strategies.
        let report = pipeline.health_status().await;
        assert_eq!(report.state, crate::health::HealthState::Unhealthy);
        assert_eq!(report.issues.len(), 2);

        pipeline.notifier().register_admin(in_app_admin("ops-1")).await;
        let report = pipeline.health_status().await;
        assert_eq!(report.state, crate::health::HealthState::Degraded);

        pipeline
            .register_strategy(
                "X",
                Arc::new(FnStrategy::new(|_| false, |_, _| {
                    RecoveryOutcome::unrecovered("n/a")
                })),
            )
            .await;
        let report = pipeline.health_status().await;
        assert_eq!(report.state, crate::health::HealthState::Healthy);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_execute_with_retry_runs_once_without_executor() {
        let (pipeline, _) = test_pipeline().await;

        let result = pipeline
            .execute_with_retry(
                "accounting",
                "post-journal",
                Box::new(|| Box::pin(async { Ok(Value::from(42)) })),
            )
            .await;

        assert_eq!(result.unwrap(), Value::from(42));
        assert!(pipeline.breaker_state("post-journal").await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_and_drains() {
        let (pipeline, inbox) = test_pipeline().await;
        pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

        // A medium fault lands in a batch; a log entry sits in the buffer.
        let fault = Fault::new("REPORTING_SLOW", "m").with_severity(Severity::Medium);
        pipeline
            .log_only(&fault, HashMap::new(), RequestMeta::default())
            .await;
        assert_eq!(pipeline.notifier().pending_batches().await, 1);

        pipeline.shutdown().await;

        assert_eq!(pipeline.sink().buffered().await, 0);
        assert_eq!(pipeline.notifier().pending_batches().await, 0);
        assert_eq!(inbox.len().await, 1);
    }
}
