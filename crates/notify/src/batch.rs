//! Batching of non-urgent notifications.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fault::{Classification, Fault};

/// One fault queued into a batch.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub fault: Fault,
    pub classification: Classification,
    pub received_at: DateTime<Utc>,
}

/// A transient aggregation of faults destined for one administrator set.
///
/// A batch grows until its scheduled send time elapses or it reaches the
/// configured maximum size, whichever comes first.
#[derive(Debug, Clone)]
pub struct NotificationBatch {
    /// When the batch timer should flush this batch.
    pub scheduled_at: DateTime<Utc>,
    /// Sorted administrator ids; the batch key together with the time.
    pub admin_ids: Vec<String>,
    pub entries: Vec<BatchEntry>,
}

impl NotificationBatch {
    /// Start a batch for an administrator set.
    #[must_use]
    pub fn new(scheduled_at: DateTime<Utc>, mut admin_ids: Vec<String>) -> Self {
        admin_ids.sort();
        Self {
            scheduled_at,
            admin_ids,
            entries: Vec::new(),
        }
    }

    /// Whether this batch serves exactly the given administrator set.
    #[must_use]
    pub fn is_for(&self, admin_ids: &[String]) -> bool {
        let mut sorted: Vec<&String> = admin_ids.iter().collect();
        sorted.sort();
        sorted.len() == self.admin_ids.len()
            && sorted.iter().zip(&self.admin_ids).all(|(a, b)| *a == b)
    }

    /// Whether the scheduled send time has elapsed.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    pub fn push(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    /// Build the flush summary: per-code counts plus the time range covered.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let mut by_code: BTreeMap<&str, u64> = BTreeMap::new();
        for entry in &self.entries {
            *by_code.entry(&entry.fault.code).or_default() += 1;
        }

        let lines: Vec<String> = by_code
            .iter()
            .map(|(code, count)| format!("{code}: {count}"))
            .collect();

        let earliest = self.entries.iter().map(|e| e.received_at).min();
        let latest = self.entries.iter().map(|e| e.received_at).max();

        BatchSummary {
            total: self.entries.len(),
            code_counts: lines.join("\n"),
            earliest,
            latest,
        }
    }
}

/// Rendered-summary inputs for a flushed batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub total: usize,
    /// One `CODE: n` line per distinct code.
    pub code_counts: String,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}
