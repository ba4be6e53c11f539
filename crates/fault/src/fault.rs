//! The fault value type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::category::Category;
use crate::classify::classify_foreign;
use crate::severity::Severity;

/// An immutable fault value flowing through the pipeline.
///
/// Faults are built once by the raising code and never mutated afterwards.
/// Severity, category, and module may be left unset; classification resolves
/// them deterministically (see [`crate::classify`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    /// Stable identifier, e.g. `ACCOUNTING_SYNC_FAILED`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Explicit severity. Wins over any derived value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Explicit category. Wins over any derived value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Owning subsystem name, e.g. `accounting`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// HTTP-like status code, used to derive severity when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Open key/value context supplied by the raising code.
    #[serde(default)]
    pub context: HashMap<String, Value>,
    /// When the fault was raised.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Fault {
    /// Create a new fault with the given code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: None,
            category: None,
            module: None,
            status: None,
            context: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set an explicit severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Set an explicit category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Set the owning module.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Set the HTTP-like status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Add a single context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Merge a whole context map.
    #[must_use]
    pub fn with_context_map(mut self, context: HashMap<String, Value>) -> Self {
        self.context.extend(context);
        self
    }

    /// Whether the raising code marked this fault as retryable.
    #[must_use]
    pub fn retryable(&self) -> bool {
        self.context
            .get("retryable")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The module recorded on the fault itself or in its context, if any.
    #[must_use]
    pub fn explicit_module(&self) -> Option<&str> {
        self.module
            .as_deref()
            .or_else(|| self.context.get("module").and_then(Value::as_str))
    }
}

/// Conversion into a [`Fault`] for anything the pipeline can ingest.
///
/// Domain error types implement this to carry their own code and
/// classification. Foreign errors get the defensive blanket treatment via the
/// [`anyhow::Error`] impl: severity high, category and module derived from
/// the message alone.
pub trait Faultlike {
    /// Produce the fault value describing this error.
    fn to_fault(&self) -> Fault;

    /// Whether this is a typed domain fault (as opposed to a foreign error).
    ///
    /// Foreign errors are logged but not notified on the `log_only` path.
    fn is_domain(&self) -> bool {
        true
    }
}

impl Faultlike for Fault {
    fn to_fault(&self) -> Fault {
        self.clone()
    }
}

impl Faultlike for anyhow::Error {
    fn to_fault(&self) -> Fault {
        let message = format!("{self:#}");
        let classification = classify_foreign("", &message);
        Fault::new("UNHANDLED_ERROR", message)
            .with_severity(classification.severity)
            .with_category(classification.category)
            .with_module(classification.module)
    }

    fn is_domain(&self) -> bool {
        false
    }
}
