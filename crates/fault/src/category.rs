//! Fault categories.

use serde::{Deserialize, Serialize};

/// Functional category of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Input or data validation failed.
    Validation,
    /// Authentication or authorization failed.
    Authentication,
    /// Database read/write failed.
    Database,
    /// Network or connectivity failure.
    Network,
    /// A downstream integration (accounting, POS, ...) misbehaved.
    Integration,
    /// A business rule was violated.
    BusinessLogic,
    /// Anything that does not fit the categories above.
    System,
}

impl Category {
    /// Get the display name for this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Database => "database",
            Self::Network => "network",
            Self::Integration => "integration",
            Self::BusinessLogic => "business_logic",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
