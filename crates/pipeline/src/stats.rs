//! Merged pipeline statistics.

use std::collections::HashMap;

use fault::{Category, Severity};
use notify::NotifyStatistics;
use serde::{Deserialize, Serialize};
use sink::LogStatistics;

/// One ranked error code with its inferred owning module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCode {
    pub code: String,
    pub module: String,
    pub count: u64,
    pub example_message: String,
}

/// Merged report over the log sink, the dispatcher, and recovery counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatistics {
    pub total_faults: u64,
    pub by_severity: HashMap<Severity, u64>,
    pub by_category: HashMap<Category, u64>,
    pub by_module: HashMap<String, u64>,
    pub top_codes: Vec<TopCode>,
    pub recovery_attempts: u64,
    pub recovery_successes: u64,
    /// Fraction of attempts that made forward progress; 1.0 with none.
    pub recovery_success_rate: f64,
    pub notifications: NotifyStatistics,
}

impl PipelineStatistics {
    /// Merge component statistics into one report.
    #[must_use]
    pub fn merge(
        logs: LogStatistics,
        notifications: NotifyStatistics,
        recovery_attempts: u64,
        recovery_successes: u64,
    ) -> Self {
        let top_codes = logs
            .top_codes
            .into_iter()
            .map(|c| TopCode {
                module: fault::infer_module(&c.code),
                code: c.code,
                count: c.count,
                example_message: c.example_message,
            })
            .collect();

        let recovery_success_rate = if recovery_attempts == 0 {
            1.0
        } else {
            recovery_successes as f64 / recovery_attempts as f64
        };

        Self {
            total_faults: logs.total,
            by_severity: logs.by_severity,
            by_category: logs.by_category,
            by_module: logs.by_module,
            top_codes,
            recovery_attempts,
            recovery_successes,
            recovery_success_rate,
            notifications,
        }
    }
}
