//! End-to-end pipeline scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveTime;
use fault::{Fault, Severity};
use notify::{
    Administrator, Channel, ChannelSender, InAppSender, NotificationPreferences, QuietHours,
};
use pipeline::{Pipeline, PipelineConfig};
use sink::{LogQuery, MemoryStore, RequestMeta};

fn in_app_admin(id: &str) -> Administrator {
    Administrator::new(id, format!("{id}@example.com"))
        .with_preferences(NotificationPreferences::all_severities(vec![Channel::InApp]))
}

async fn build_pipeline(config: PipelineConfig) -> (Pipeline, Arc<InAppSender>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let inbox = Arc::new(InAppSender::new());
    let pipeline = Pipeline::new(
        config,
        Some(Arc::new(MemoryStore::new())),
        vec![inbox.clone() as Arc<dyn ChannelSender>],
        None,
    )
    .await;
    (pipeline, inbox)
}

/// A fault with status 503 and no explicit severity is classified critical,
/// routed immediately, and reaches every administrator whose preferences
/// include critical - quiet hours notwithstanding.
#[tokio::test]
async fn immediate_critical_path() {
    let (pipeline, inbox) = build_pipeline(PipelineConfig::test()).await;

    pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

    let all_day = QuietHours {
        start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        timezone: chrono_tz::UTC,
    };
    let night_owl = in_app_admin("ops-2").with_preferences(NotificationPreferences {
        quiet_hours: Some(all_day),
        ..NotificationPreferences::all_severities(vec![Channel::InApp])
    });
    pipeline.notifier().register_admin(night_owl).await;

    let result: Result<(), Fault> = pipeline
        .handle("accounting-sync", async {
            Err(Fault::new("ACCOUNTING_SYNC_FAILED", "ledger upstream unavailable")
                .with_status(503)
                .with_module("accounting"))
        })
        .await;
    assert!(result.is_err());

    // Derived classification is critical.
    let entries = pipeline.sink().query(&LogQuery::default()).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].classification.severity, Severity::Critical);
    assert_eq!(entries[0].classification.module, "accounting");

    // One delivery attempt per administrator per allowed channel, quiet
    // hours included.
    assert_eq!(inbox.inbox_for("ops-1").await.len(), 1);
    assert_eq!(inbox.inbox_for("ops-2").await.len(), 1);
}

/// Ten medium faults inside one batching interval collapse into exactly one
/// summary message per administrator per channel.
#[tokio::test]
async fn batched_low_priority_path() {
    let mut config = PipelineConfig::test();
    config.notifications.batching_interval_ms = 3_600_000;
    config.notifications.max_batch_size = 10;
    let (pipeline, inbox) = build_pipeline(config).await;

    pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

    let fault = Fault::new("REPORT_TIMEOUT", "monthly report generation timed out")
        .with_severity(Severity::Medium)
        .with_module("reporting");

    for _ in 0..10 {
        pipeline
            .log_only(&fault, HashMap::new(), RequestMeta::default())
            .await;
    }

    // Reaching max size flushed the single batch; no second batch exists.
    assert_eq!(pipeline.notifier().pending_batches().await, 0);

    let messages = inbox.inbox_for("ops-1").await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].body.contains("REPORT_TIMEOUT: 10"));
}

/// With a rate limit of one pass per hour, the second immediate notification
/// to the same administrator is rate limited and never reaches the sender.
#[tokio::test]
async fn rate_limit_exhaustion() {
    let mut config = PipelineConfig::test();
    config.notifications.rate_limit_per_hour = 1;
    let (pipeline, inbox) = build_pipeline(config).await;

    pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

    let fault = Fault::new("DB_PRIMARY_LOST", "primary database unreachable")
        .with_severity(Severity::Critical);

    let first = pipeline
        .notifier()
        .notify_critical(&fault, HashMap::new())
        .await;
    assert!(first.iter().all(|r| r.success));

    let second = pipeline
        .notifier()
        .notify_critical(&fault, HashMap::new())
        .await;
    assert_eq!(second.len(), 1);
    assert!(!second[0].success);
    assert_eq!(second[0].error.as_deref(), Some("rate limited"));

    // The sender saw exactly one message.
    assert_eq!(inbox.len().await, 1);
}

/// Merged statistics pick up faults, recovery counters, and deliveries.
#[tokio::test]
async fn merged_statistics() {
    let (pipeline, _inbox) = build_pipeline(PipelineConfig::test()).await;
    pipeline.notifier().register_admin(in_app_admin("ops-1")).await;

    let result: Result<(), Fault> = pipeline
        .handle("pos-heartbeat", async {
            Err(Fault::new("POS_OFFLINE", "register 4 unreachable")
                .with_severity(Severity::Critical)
                .with_module("pos"))
        })
        .await;
    assert!(result.is_err());

    let stats = pipeline.statistics(chrono::Duration::hours(1)).await;
    assert_eq!(stats.total_faults, 1);
    assert_eq!(stats.by_module["pos"], 1);
    assert_eq!(stats.by_severity[&Severity::Critical], 1);
    assert_eq!(stats.top_codes[0].code, "POS_OFFLINE");
    assert_eq!(stats.top_codes[0].module, "pos");
    assert_eq!(stats.notifications.attempts, 1);
    assert_eq!(stats.notifications.delivered, 1);
}
