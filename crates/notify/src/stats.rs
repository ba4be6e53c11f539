//! Delivery statistics.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::admin::Channel;

/// How long delivery records are retained for statistics.
const RECORD_RETENTION_HOURS: i64 = 24 * 7;

/// One recorded delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub channel: Channel,
    pub success: bool,
    pub at: DateTime<Utc>,
}

/// Per-channel attempt/success counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub attempts: u64,
    pub delivered: u64,
}

/// Aggregate notification statistics over a period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyStatistics {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub by_channel: HashMap<Channel, ChannelStats>,
    /// Fraction of attempts that succeeded; 1.0 when nothing was attempted.
    pub delivery_rate: f64,
}

/// Rolling log of delivery attempts feeding [`NotifyStatistics`].
#[derive(Default)]
pub struct DeliveryLog {
    records: Mutex<Vec<DeliveryRecord>>,
}

impl DeliveryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt, pruning records past retention.
    pub async fn record(&self, channel: Channel, success: bool) {
        let now = Utc::now();
        let cutoff = now - Duration::hours(RECORD_RETENTION_HOURS);

        let mut records = self.records.lock().await;
        records.retain(|r| r.at >= cutoff);
        records.push(DeliveryRecord {
            channel,
            success,
            at: now,
        });
    }

    /// Statistics over records newer than `now - period`.
    pub async fn statistics(&self, period: Duration) -> NotifyStatistics {
        let cutoff = Utc::now() - period;
        let records = self.records.lock().await;

        let mut stats = NotifyStatistics::default();
        for record in records.iter().filter(|r| r.at >= cutoff) {
            stats.attempts += 1;
            let channel = stats.by_channel.entry(record.channel).or_default();
            channel.attempts += 1;
            if record.success {
                stats.delivered += 1;
                channel.delivered += 1;
            } else {
                stats.failed += 1;
            }
        }

        stats.delivery_rate = if stats.attempts == 0 {
            1.0
        } else {
            stats.delivered as f64 / stats.attempts as f64
        };

        stats
    }
}
