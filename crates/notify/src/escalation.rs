//! Escalation rules and their runtime trackers.
//!
//! Rules are static configuration: which faults qualify, who gets told
//! immediately, and optionally who gets told *again* if the condition is
//! still unresolved after a delay. The mutable runtime state lives in
//! [`EscalationTracker`]: a sliding occurrence counter per rule and one
//! pending delayed task per unresolved error code.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use fault::{Classification, Fault, Severity};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::admin::Channel;

/// Frequency threshold: `count` qualifying faults within `period_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyThreshold {
    pub count: u32,
    pub period_ms: u64,
}

/// Which faults a rule applies to. Empty sets are wildcards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    pub severities: Vec<Severity>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub error_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<FrequencyThreshold>,
}

/// What happens when a rule fires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleActions {
    /// Administrators to notify immediately. Empty means every eligible
    /// administrator.
    #[serde(default)]
    pub notify_admin_ids: Vec<String>,
    /// Channels for the second-stage escalation message.
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Delay before the unresolved condition is escalated further.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalate_after_ms: Option<u64>,
    /// Who the second stage goes to.
    #[serde(default)]
    pub escalation_admin_ids: Vec<String>,
}

/// A configured escalation rule. Loaded once, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub name: String,
    pub conditions: RuleConditions,
    pub actions: RuleActions,
}

impl EscalationRule {
    /// Whether a fault matches this rule's qualifying conditions.
    ///
    /// True iff the severity is listed AND (modules empty OR module listed)
    /// AND (codes empty OR code listed). The frequency threshold is *not*
    /// part of this check; it only gates the delayed second stage.
    #[must_use]
    pub fn matches(&self, fault: &Fault, classification: &Classification) -> bool {
        self.conditions.severities.contains(&classification.severity)
            && (self.conditions.modules.is_empty()
                || self.conditions.modules.contains(&classification.module))
            && (self.conditions.error_codes.is_empty()
                || self.conditions.error_codes.contains(&fault.code))
    }
}

/// Runtime state for escalation rules.
#[derive(Default)]
pub struct EscalationTracker {
    /// Sliding occurrence window per rule name.
    occurrences: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    /// Pending delayed escalations per error code.
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl EscalationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one qualifying occurrence and report whether the rule's
    /// frequency threshold is met.
    ///
    /// Rules without a threshold are considered met on every occurrence.
    pub async fn record(&self, rule: &EscalationRule, at: DateTime<Utc>) -> bool {
        let Some(frequency) = &rule.conditions.frequency else {
            return true;
        };

        let mut occurrences = self.occurrences.lock().await;
        let window = occurrences.entry(rule.name.clone()).or_default();

        let cutoff = at - Duration::milliseconds(frequency.period_ms as i64);
        while window.front().is_some_and(|t| *t < cutoff) {
            window.pop_front();
        }
        window.push_back(at);

        let met = window.len() as u32 >= frequency.count;
        if met {
            debug!(rule = %rule.name, count = window.len(), "Escalation frequency threshold met");
        }
        met
    }

    /// Whether a delayed escalation is already pending for this code.
    pub async fn is_armed(&self, code: &str) -> bool {
        self.pending.lock().await.contains_key(code)
    }

    /// Arm the delayed second stage for an error code.
    ///
    /// At most one task is pending per code; re-arming while one is pending
    /// is a no-op so a storm of matching faults yields a single escalation.
    pub async fn arm(&self, code: &str, task: JoinHandle<()>) {
        let mut pending = self.pending.lock().await;
        if pending.contains_key(code) {
            task.abort();
            return;
        }
        info!(code, "Armed delayed escalation");
        pending.insert(code.to_string(), task);
    }

    /// Mark an error code resolved, cancelling its pending escalation.
    pub async fn resolve(&self, code: &str) {
        if let Some(task) = self.pending.lock().await.remove(code) {
            task.abort();
            info!(code, "Cancelled pending escalation, condition resolved");
        }
    }

    /// Drop the bookkeeping for a code whose escalation has fired.
    pub async fn complete(&self, code: &str) {
        self.pending.lock().await.remove(code);
    }

    /// Cancel everything; used on shutdown.
    pub async fn shutdown(&self) {
        let mut pending = self.pending.lock().await;
        for (_, task) in pending.drain() {
            task.abort();
        }
    }
}
