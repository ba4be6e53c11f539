//! Pipeline health reporting.

use serde::{Deserialize, Serialize};

/// Aggregate health of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Every component probe passed.
    Healthy,
    /// One component is misbehaving; the pipeline still functions.
    Degraded,
    /// Two or more components are misbehaving.
    Unhealthy,
}

/// Health probe result with human-readable issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub issues: Vec<String>,
}

impl HealthReport {
    /// Aggregate per-component probe failures into a report.
    ///
    /// `failed_components` counts components whose probe failed, which may
    /// differ from the number of issue strings.
    #[must_use]
    pub fn from_issues(failed_components: usize, issues: Vec<String>) -> Self {
        let state = match failed_components {
            0 => HealthState::Healthy,
            1 => HealthState::Degraded,
            _ => HealthState::Unhealthy,
        };
        Self { state, issues }
    }
}
