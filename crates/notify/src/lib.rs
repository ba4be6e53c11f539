//! Administrator notification dispatcher for Meridian faults.
//!
//! The dispatcher decides who to tell, when, and how, without ever blocking
//! or crashing the caller. It holds the registered administrators and their
//! preferences, evaluates escalation rules, enforces per-administrator rate
//! limits and quiet hours, batches non-urgent faults, and renders and sends
//! messages through one or more channels.
//!
//! # Architecture
//!
//! Channels use a trait-based design for extensibility:
//!
//! - [`ChannelSender`] defines the interface for delivery channels
//! - [`WebhookSender`], [`GatewaySender`], and [`InAppSender`] implement it
//! - [`Notifier`] selects administrators and fans out to their channels
//!
//! Delivery results are collected and recorded but failures are never
//! propagated back to the code that raised the original fault.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]

pub mod admin;
pub mod batch;
pub mod channels;
pub mod error;
pub mod escalation;
pub mod rate_limit;
pub mod stats;
pub mod template;

pub use admin::{Administrator, Channel, NotificationPreferences, QuietHours};
pub use batch::{BatchEntry, NotificationBatch};
pub use channels::gateway::GatewaySender;
pub use channels::in_app::InAppSender;
pub use channels::webhook::WebhookSender;
pub use channels::{ChannelSender, DeliveryResult, Message};
pub use error::ChannelError;
pub use escalation::{
    EscalationRule, EscalationTracker, FrequencyThreshold, RuleActions, RuleConditions,
};
pub use rate_limit::RateLimiter;
pub use stats::{DeliveryLog, NotifyStatistics};
pub use template::{NotificationTemplate, TemplateSet};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fault::{classify, Classification, Fault, Severity};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often the batch timer looks for due batches.
const BATCH_TICK: std::time::Duration = std::time::Duration::from_secs(1);

/// Dispatcher configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Global kill switch; a disabled dispatcher returns no results.
    pub enabled: bool,
    /// Notification passes allowed per administrator per rolling hour.
    pub rate_limit_per_hour: u32,
    /// Whether non-urgent faults are batched.
    pub batching_enabled: bool,
    /// How long a batch waits before its scheduled send.
    pub batch_interval: std::time::Duration,
    /// A batch reaching this size flushes immediately.
    pub max_batch_size: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_per_hour: 10,
            batching_enabled: true,
            batch_interval: std::time::Duration::from_secs(60),
            max_batch_size: 10,
        }
    }
}

/// Central notification dispatcher.
pub struct Notifier {
    config: NotifierConfig,
    /// Registration order is preserved; `notify` processes administrators in
    /// this order.
    admins: RwLock<Vec<Administrator>>,
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
    templates: TemplateSet,
    rules: Vec<EscalationRule>,
    rate_limiter: RateLimiter,
    batches: Mutex<Vec<NotificationBatch>>,
    escalation: EscalationTracker,
    deliveries: DeliveryLog,
    batch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Notifier {
    /// Create a dispatcher with the given channel senders, templates, and
    /// escalation rules.
    #[must_use]
    pub fn new(
        config: NotifierConfig,
        senders: Vec<Arc<dyn ChannelSender>>,
        templates: TemplateSet,
        rules: Vec<EscalationRule>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_per_hour);
        let senders = senders.into_iter().map(|s| (s.channel(), s)).collect();

        Self {
            config,
            admins: RwLock::new(Vec::new()),
            senders,
            templates,
            rules,
            rate_limiter,
            batches: Mutex::new(Vec::new()),
            escalation: EscalationTracker::new(),
            deliveries: DeliveryLog::new(),
            batch_task: Mutex::new(None),
        }
    }

    /// Create a disabled dispatcher (for testing or when notifications are
    /// off).
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(
            NotifierConfig {
                enabled: false,
                ..NotifierConfig::default()
            },
            Vec::new(),
            TemplateSet::default(),
            Vec::new(),
        )
    }

    // =========================================================================
    // Administrator registry
    // =========================================================================

    /// Register an administrator, replacing any existing entry with the same
    /// id in place.
    pub async fn register_admin(&self, admin: Administrator) {
        let mut admins = self.admins.write().await;
        if let Some(existing) = admins.iter_mut().find(|a| a.id == admin.id) {
            *existing = admin;
        } else {
            info!(admin = %admin.id, "Registered administrator");
            admins.push(admin);
        }
    }

    /// Remove an administrator. Returns whether one was removed.
    pub async fn unregister_admin(&self, id: &str) -> bool {
        let mut admins = self.admins.write().await;
        let before = admins.len();
        admins.retain(|a| a.id != id);
        before != admins.len()
    }

    /// Replace an administrator's preferences. Returns whether they exist.
    pub async fn update_preferences(&self, id: &str, preferences: NotificationPreferences) -> bool {
        let mut admins = self.admins.write().await;
        match admins.iter_mut().find(|a| a.id == id) {
            Some(admin) => {
                admin.preferences = preferences;
                true
            }
            None => false,
        }
    }

    /// Number of registered administrators.
    pub async fn admin_count(&self) -> usize {
        self.admins.read().await.len()
    }

    /// Id of the first registered administrator, if any. Health probes use
    /// this as their test target.
    pub async fn first_admin_id(&self) -> Option<String> {
        self.admins.read().await.first().map(|a| a.id.clone())
    }

    /// Look up a registered administrator by id.
    pub async fn get_admin(&self, id: &str) -> Option<Administrator> {
        self.admins.read().await.iter().find(|a| a.id == id).cloned()
    }

    // =========================================================================
    // Notification entry points
    // =========================================================================

    /// Notify administrators about a fault.
    ///
    /// Returns the per-channel delivery results of the immediate path, or an
    /// empty list when the fault was batched, nobody was eligible, or the
    /// dispatcher is disabled.
    pub async fn notify(
        self: &Arc<Self>,
        fault: &Fault,
        context: HashMap<String, Value>,
        force_immediate: bool,
    ) -> Vec<DeliveryResult> {
        if !self.config.enabled {
            debug!("Notifications disabled, skipping fault");
            return Vec::new();
        }

        let fault = fault.clone().with_context_map(context);
        let classification = classify(&fault);
        let now = Utc::now();

        let eligible = self.eligible_admins(&classification, now).await;
        if eligible.is_empty() {
            debug!(code = %fault.code, "No eligible administrators for fault");
            return Vec::new();
        }

        // Evaluate escalation rules. A match on the qualifying fields alone
        // forces immediate routing; the frequency threshold only gates the
        // delayed second stage.
        let mut rule_matched = false;
        let mut narrowed_ids: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !rule.matches(&fault, &classification) {
                continue;
            }
            rule_matched = true;
            narrowed_ids.extend(rule.actions.notify_admin_ids.iter().cloned());

            let threshold_met = self.escalation.record(rule, now).await;
            if threshold_met {
                if let Some(delay_ms) = rule.actions.escalate_after_ms {
                    self.arm_escalation(rule, &fault, &classification, delay_ms)
                        .await;
                }
            }
        }

        let immediate = force_immediate
            || fault.status.is_some_and(|s| s >= 500)
            || classification.severity == Severity::Critical
            || rule_matched;

        if immediate || !self.config.batching_enabled {
            // A matched rule naming administrators narrows the immediate set,
            // unless none of them are eligible.
            let recipients = if narrowed_ids.is_empty() {
                eligible
            } else {
                let narrowed: Vec<Administrator> = eligible
                    .iter()
                    .filter(|a| narrowed_ids.contains(&a.id))
                    .cloned()
                    .collect();
                if narrowed.is_empty() {
                    eligible
                } else {
                    narrowed
                }
            };
            self.deliver_pass(&recipients, &fault, &classification).await
        } else {
            self.enqueue_batch(&eligible, fault, classification, now).await;
            Vec::new()
        }
    }

    /// Notify on the immediate path, bypassing batching.
    pub async fn notify_critical(
        self: &Arc<Self>,
        fault: &Fault,
        context: HashMap<String, Value>,
    ) -> Vec<DeliveryResult> {
        self.notify(fault, context, true).await
    }

    /// Synthesize a system-level fault from a health observation and route it
    /// immediately.
    pub async fn notify_system_health(
        self: &Arc<Self>,
        message: &str,
        severity: Severity,
        metrics: HashMap<String, Value>,
    ) -> Vec<DeliveryResult> {
        let fault = Fault::new("SYSTEM_HEALTH", message)
            .with_severity(severity)
            .with_module("system");
        self.notify(&fault, metrics, true).await
    }

    /// Send a synthetic low-severity message to verify channel connectivity.
    ///
    /// Goes through the same rate-limit bookkeeping as a real send.
    pub async fn test_notification(&self, admin_id: &str, channel: Channel) -> DeliveryResult {
        let admin = {
            let admins = self.admins.read().await;
            admins.iter().find(|a| a.id == admin_id).cloned()
        };
        let Some(admin) = admin else {
            return DeliveryResult::failed(admin_id, channel, "unknown administrator");
        };

        if !self.rate_limiter.try_acquire(&admin.id).await {
            let result = DeliveryResult::rate_limited(&admin.id, channel);
            self.deliveries.record(channel, false).await;
            return result;
        }

        let fault = Fault::new("NOTIFICATION_TEST", "Connectivity test from the fault pipeline")
            .with_severity(Severity::Low)
            .with_module("notification");
        let classification = classify(&fault);
        let message = self.templates.render(channel, &fault, &classification);

        let result = match self.senders.get(&channel) {
            Some(sender) => sender.deliver(&admin, &message).await,
            None => DeliveryResult::failed(&admin.id, channel, "no sender configured for channel"),
        };
        self.deliveries.record(channel, result.success).await;
        result
    }

    /// Mark an error code resolved, cancelling any pending second-stage
    /// escalation for it.
    pub async fn resolve(&self, code: &str) {
        self.escalation.resolve(code).await;
    }

    /// Delivery statistics over the given period.
    pub async fn statistics(&self, period: chrono::Duration) -> NotifyStatistics {
        self.deliveries.statistics(period).await
    }

    /// Number of batches waiting on the timer.
    pub async fn pending_batches(&self) -> usize {
        self.batches.lock().await.len()
    }

    // =========================================================================
    // Selection and delivery
    // =========================================================================

    /// Active administrators whose preferences accept the classification and
    /// who are not inside quiet hours (critical ignores quiet hours).
    async fn eligible_admins(
        &self,
        classification: &Classification,
        now: DateTime<Utc>,
    ) -> Vec<Administrator> {
        self.admins
            .read()
            .await
            .iter()
            .filter(|a| {
                a.is_active
                    && a.preferences.accepts(classification)
                    && !a.preferences.quiet_at(now, classification.severity)
            })
            .cloned()
            .collect()
    }

    /// One immediate delivery pass over the given administrators.
    ///
    /// Administrators are processed in registration order and channels in
    /// preference order. The rate limit is taken once per administrator for
    /// the whole pass, not once per channel.
    async fn deliver_pass(
        &self,
        admins: &[Administrator],
        fault: &Fault,
        classification: &Classification,
    ) -> Vec<DeliveryResult> {
        let mut results = Vec::new();

        for admin in admins {
            if !self.rate_limiter.try_acquire(&admin.id).await {
                for channel in &admin.preferences.channels {
                    self.deliveries.record(*channel, false).await;
                    results.push(DeliveryResult::rate_limited(&admin.id, *channel));
                }
                continue;
            }

            for channel in &admin.preferences.channels {
                let result = self.send_one(admin, *channel, fault, classification).await;
                results.push(result);
            }
        }

        results
    }

    async fn send_one(
        &self,
        admin: &Administrator,
        channel: Channel,
        fault: &Fault,
        classification: &Classification,
    ) -> DeliveryResult {
        let result = match self.senders.get(&channel) {
            Some(sender) => {
                let message = self.templates.render(channel, fault, classification);
                sender.deliver(admin, &message).await
            }
            None => DeliveryResult::failed(&admin.id, channel, "no sender configured for channel"),
        };
        self.deliveries.record(channel, result.success).await;
        result
    }

    // =========================================================================
    // Batching
    // =========================================================================

    /// Append a fault to the pending batch for this administrator set,
    /// creating one if needed, and flush right away if the batch is full.
    async fn enqueue_batch(
        &self,
        eligible: &[Administrator],
        fault: Fault,
        classification: Classification,
        now: DateTime<Utc>,
    ) {
        let admin_ids: Vec<String> = eligible.iter().map(|a| a.id.clone()).collect();
        let entry = BatchEntry {
            fault,
            classification,
            received_at: now,
        };

        let full_batch = {
            let mut batches = self.batches.lock().await;
            let idx = match batches.iter().position(|b| b.is_for(&admin_ids)) {
                Some(idx) => idx,
                None => {
                    let interval = chrono::Duration::from_std(self.config.batch_interval)
                        .unwrap_or_else(|_| chrono::Duration::seconds(60));
                    batches.push(NotificationBatch::new(now + interval, admin_ids.clone()));
                    batches.len() - 1
                }
            };

            batches[idx].push(entry);
            if batches[idx].entries.len() >= self.config.max_batch_size {
                Some(batches.remove(idx))
            } else {
                None
            }
        };

        if let Some(batch) = full_batch {
            debug!(
                count = batch.entries.len(),
                "Batch reached max size, flushing early"
            );
            self.flush_batch(batch).await;
        }
    }

    /// Flush batches whose scheduled time has elapsed, in scheduled order.
    pub async fn flush_due_batches(&self) {
        let now = Utc::now();
        let due: Vec<NotificationBatch> = {
            let mut batches = self.batches.lock().await;
            let mut due: Vec<NotificationBatch> = Vec::new();
            let mut remaining = Vec::new();
            for batch in batches.drain(..) {
                if batch.is_due(now) {
                    due.push(batch);
                } else {
                    remaining.push(batch);
                }
            }
            *batches = remaining;
            due.sort_by_key(|b| b.scheduled_at);
            due
        };

        for batch in due {
            self.flush_batch(batch).await;
        }
    }

    /// Send one summary message per administrator per channel for a batch.
    async fn flush_batch(&self, batch: NotificationBatch) -> Vec<DeliveryResult> {
        if batch.entries.is_empty() {
            return Vec::new();
        }

        let summary = batch.summary();
        let earliest = summary
            .earliest
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        let latest = summary
            .latest
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());

        let admins = self.admins.read().await.clone();
        let mut results = Vec::new();

        for admin_id in &batch.admin_ids {
            let Some(admin) = admins.iter().find(|a| &a.id == admin_id && a.is_active) else {
                // Unregistered since the batch was created.
                continue;
            };

            if !self.rate_limiter.try_acquire(admin_id).await {
                for channel in &admin.preferences.channels {
                    self.deliveries.record(*channel, false).await;
                    results.push(DeliveryResult::rate_limited(admin_id, *channel));
                }
                continue;
            }

            for channel in &admin.preferences.channels {
                let message = self.templates.render_batch(
                    summary.total,
                    &summary.code_counts,
                    &earliest,
                    &latest,
                );
                let result = match self.senders.get(channel) {
                    Some(sender) => sender.deliver(admin, &message).await,
                    None => DeliveryResult::failed(
                        admin_id,
                        *channel,
                        "no sender configured for channel",
                    ),
                };
                self.deliveries.record(*channel, result.success).await;
                results.push(result);
            }
        }

        info!(
            faults = summary.total,
            admins = batch.admin_ids.len(),
            "Flushed notification batch"
        );
        results
    }

    // =========================================================================
    // Escalation
    // =========================================================================

    /// Arm the delayed second-stage escalation for a matched rule.
    async fn arm_escalation(
        self: &Arc<Self>,
        rule: &EscalationRule,
        fault: &Fault,
        classification: &Classification,
        delay_ms: u64,
    ) {
        if self.escalation.is_armed(&fault.code).await {
            return;
        }

        let weak = Arc::downgrade(self);
        let rule = rule.clone();
        let fault = fault.clone();
        let classification = classification.clone();
        let code = fault.code.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            if let Some(notifier) = weak.upgrade() {
                notifier.fire_escalation(&rule, &fault, &classification).await;
            }
        });

        self.escalation.arm(&code, task).await;
    }

    /// Deliver the second-stage escalation to the rule's escalation
    /// administrators.
    ///
    /// The preference invariants still hold: an administrator outside the
    /// fault's severity/module filters, or inside quiet hours for a
    /// non-critical fault, is skipped even here.
    async fn fire_escalation(
        &self,
        rule: &EscalationRule,
        fault: &Fault,
        classification: &Classification,
    ) {
        self.escalation.complete(&fault.code).await;

        warn!(
            rule = %rule.name,
            code = %fault.code,
            "Condition unresolved past its escalation delay, notifying second-stage administrators"
        );

        let now = Utc::now();
        let admins = self.admins.read().await.clone();

        for admin_id in &rule.actions.escalation_admin_ids {
            let Some(admin) = admins.iter().find(|a| {
                &a.id == admin_id
                    && a.is_active
                    && a.preferences.accepts(classification)
                    && !a.preferences.quiet_at(now, classification.severity)
            }) else {
                continue;
            };

            if !self.rate_limiter.try_acquire(admin_id).await {
                for channel in &admin.preferences.channels {
                    self.deliveries.record(*channel, false).await;
                }
                continue;
            }

            for channel in &admin.preferences.channels {
                // Rule channels, when configured, further restrict the fan-out.
                if !rule.actions.channels.is_empty() && !rule.actions.channels.contains(channel) {
                    continue;
                }

                let mut message = self.templates.render(*channel, fault, classification);
                message.subject = format!("[ESCALATED] {}", message.subject);

                let result = match self.senders.get(channel) {
                    Some(sender) => sender.deliver(admin, &message).await,
                    None => DeliveryResult::failed(
                        admin_id,
                        *channel,
                        "no sender configured for channel",
                    ),
                };
                self.deliveries.record(*channel, result.success).await;
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawn the periodic batch-flush task.
    pub async fn start_batch_timer(self: &Arc<Self>) {
        if !self.config.batching_enabled {
            return;
        }

        let mut task = self.batch_task.lock().await;
        if task.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        *task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(BATCH_TICK).await;
                let Some(notifier) = weak.upgrade() else {
                    break;
                };
                notifier.flush_due_batches().await;
            }
        }));

        debug!("Batch flush timer started");
    }

    /// Cancel the batch timer, drain every pending batch, and abort pending
    /// escalations.
    pub async fn shutdown(&self) {
        if let Some(task) = self.batch_task.lock().await.take() {
            task.abort();
        }

        let pending: Vec<NotificationBatch> = {
            let mut batches = self.batches.lock().await;
            batches.drain(..).collect()
        };
        for batch in pending {
            self.flush_batch(batch).await;
        }

        self.escalation.shutdown().await;
    }
}
