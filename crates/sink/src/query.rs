//! Log queries and statistics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fault::{Category, Severity};
use serde::{Deserialize, Serialize};

use crate::entry::LogEntry;

/// How many distinct error codes the statistics report ranks.
const TOP_CODES: usize = 10;

/// Filter set for querying buffered and persisted log entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl LogQuery {
    /// Everything logged after the given instant.
    #[must_use]
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            ..Self::default()
        }
    }

    /// Whether an entry passes every configured filter.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(from) = self.from {
            if entry.logged_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.logged_at > to {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if entry.classification.severity != severity {
                return false;
            }
        }
        if let Some(category) = self.category {
            if entry.classification.category != category {
                return false;
            }
        }
        if let Some(module) = &self.module {
            if &entry.classification.module != module {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if entry.meta.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        true
    }

    /// Sort newest-first and apply offset/limit pagination in place.
    pub fn paginate(&self, entries: &mut Vec<LogEntry>) {
        entries.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        if self.offset > 0 {
            entries.drain(..self.offset.min(entries.len()));
        }
        if let Some(limit) = self.limit {
            entries.truncate(limit);
        }
    }
}

/// One ranked error code in a statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeFrequency {
    pub code: String,
    pub count: u64,
    /// A representative message for this code.
    pub example_message: String,
}

/// Aggregate statistics over a time window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStatistics {
    pub total: u64,
    pub by_severity: HashMap<Severity, u64>,
    pub by_category: HashMap<Category, u64>,
    pub by_module: HashMap<String, u64>,
    pub top_codes: Vec<CodeFrequency>,
}

impl LogStatistics {
    /// Compute statistics over a set of entries.
    #[must_use]
    pub fn compute(entries: &[LogEntry]) -> Self {
        let mut stats = Self {
            total: entries.len() as u64,
            ..Self::default()
        };

        let mut codes: HashMap<&str, (u64, &str)> = HashMap::new();
        for entry in entries {
            *stats
                .by_severity
                .entry(entry.classification.severity)
                .or_default() += 1;
            *stats
                .by_category
                .entry(entry.classification.category)
                .or_default() += 1;
            *stats
                .by_module
                .entry(entry.classification.module.clone())
                .or_default() += 1;

            let slot = codes
                .entry(&entry.fault.code)
                .or_insert((0, &entry.fault.message));
            slot.0 += 1;
        }

        let mut ranked: Vec<_> = codes.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));
        stats.top_codes = ranked
            .into_iter()
            .take(TOP_CODES)
            .map(|(code, (count, message))| CodeFrequency {
                code: code.to_string(),
                count,
                example_message: message.to_string(),
            })
            .collect();

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::RequestMeta;
    use fault::{classify, Fault};

    fn entry(code: &str, message: &str) -> LogEntry {
        let fault = Fault::new(code, message);
        let classification = classify(&fault);
        LogEntry::new(fault, classification, RequestMeta::default())
    }

    #[test]
    fn test_query_filters() {
        let e = entry("POS_OFFLINE", "network down");
        assert!(LogQuery::default().matches(&e));

        let q = LogQuery {
            module: Some("pos".to_string()),
            ..LogQuery::default()
        };
        assert!(q.matches(&e));

        let q = LogQuery {
            module: Some("accounting".to_string()),
            ..LogQuery::default()
        };
        assert!(!q.matches(&e));

        let q = LogQuery {
            severity: Some(Severity::Critical),
            ..LogQuery::default()
        };
        assert!(!q.matches(&e));
    }

    #[test]
    fn test_pagination_newest_first() {
        let mut entries: Vec<LogEntry> = (0..5).map(|i| entry(&format!("C{i}"), "m")).collect();
        // Stamp increasing times so ordering is deterministic.
        for (i, e) in entries.iter_mut().enumerate() {
            e.logged_at = Utc::now() + chrono::Duration::seconds(i as i64);
        }

        let q = LogQuery {
            offset: 1,
            limit: Some(2),
            ..LogQuery::default()
        };
        let mut page = entries.clone();
        q.paginate(&mut page);

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].fault.code, "C3");
        assert_eq!(page[1].fault.code, "C2");
    }

    #[test]
    fn test_statistics_top_codes() {
        let mut entries = vec![];
        for _ in 0..3 {
            entries.push(entry("POS_OFFLINE", "register unreachable"));
        }
        entries.push(entry("HR_IMPORT_FAILED", "bad csv"));

        let stats = LogStatistics::compute(&entries);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.top_codes[0].code, "POS_OFFLINE");
        assert_eq!(stats.top_codes[0].count, 3);
        assert_eq!(stats.top_codes[0].example_message, "register unreachable");
        assert_eq!(stats.by_module["pos"], 3);
    }
}
