//! Severity levels for faults and notifications.

use serde::{Deserialize, Serialize};

/// Severity of a fault, ordered from least to most urgent.
///
/// The ordering is meaningful: preferences and escalation rules compare
/// severities, and `Critical` bypasses quiet hours and batching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or informational - no operational impact.
    Low,
    /// Needs attention but does not interrupt operations.
    Medium,
    /// High impact or imminent risk.
    High,
    /// Immediate action required.
    Critical,
}

impl Severity {
    /// Derive a severity from an HTTP-like status code.
    ///
    /// Server-side failures (>= 500) are critical, client-side failures
    /// (>= 400) are high, anything else is medium.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        if status >= 500 {
            Self::Critical
        } else if status >= 400 {
            Self::High
        } else {
            Self::Medium
        }
    }

    /// Get the display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_boundaries() {
        assert_eq!(Severity::from_status(500), Severity::Critical);
        assert_eq!(Severity::from_status(503), Severity::Critical);
        assert_eq!(Severity::from_status(499), Severity::High);
        assert_eq!(Severity::from_status(400), Severity::High);
        assert_eq!(Severity::from_status(399), Severity::Medium);
        assert_eq!(Severity::from_status(200), Severity::Medium);
    }

    #[test]
    fn test_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_serde_lowercase() {
        let s: Severity = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(s, Severity::Critical);
        assert_eq!(serde_json::to_string(&Severity::Low).unwrap(), "\"low\"");
    }
}
