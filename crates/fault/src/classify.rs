//! Deterministic fault classification.
//!
//! Classification fills in whatever the raising code left unset. The rules
//! are ordered `(pattern, result)` tables evaluated top to bottom with a
//! fixed default, so the outcome is a pure function of the fault's fields.

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::fault::Fault;
use crate::severity::Severity;

/// Module name assigned when nothing identifies the owning subsystem.
pub const UNKNOWN_MODULE: &str = "unknown";

/// Ordered message-substring table for category derivation. First match wins.
const CATEGORY_PATTERNS: &[(&str, Category)] = &[
    ("validation", Category::Validation),
    ("auth", Category::Authentication),
    ("database", Category::Database),
    ("network", Category::Network),
];

/// Ordered label-substring table for module derivation. First match wins.
const MODULE_PATTERNS: &[(&str, &str)] = &[
    ("accounting", "accounting"),
    ("reporting", "reporting"),
    ("pos", "pos"),
    ("notification", "notification"),
];

/// A fully resolved classification: every fault has exactly one of these by
/// the time it reaches the log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub category: Category,
    pub module: String,
}

/// Classify a typed fault.
///
/// Explicit values always win. Severity otherwise derives from the status
/// code (falling back to medium when there is none); category from the
/// message text; module from the context and then the fault code.
#[must_use]
pub fn classify(fault: &Fault) -> Classification {
    let severity = fault
        .severity
        .or(fault.status.map(Severity::from_status))
        .unwrap_or(Severity::Medium);

    let category = fault
        .category
        .unwrap_or_else(|| category_from_message(&fault.message));

    let module = fault
        .explicit_module()
        .map_or_else(|| infer_module(&fault.code), str::to_string);

    Classification {
        severity,
        category,
        module,
    }
}

/// Classify a foreign (untyped) error defensively.
///
/// Foreign errors default to high severity; category comes from the message,
/// module from the error's type name.
#[must_use]
pub fn classify_foreign(type_name: &str, message: &str) -> Classification {
    Classification {
        severity: Severity::High,
        category: category_from_message(message),
        module: infer_module(type_name),
    }
}

fn category_from_message(message: &str) -> Category {
    let haystack = message.to_lowercase();
    for (pattern, category) in CATEGORY_PATTERNS {
        if haystack.contains(pattern) {
            return *category;
        }
    }
    Category::System
}

/// Infer the owning module from a code or type-name label.
#[must_use]
pub fn infer_module(label: &str) -> String {
    let haystack = label.to_lowercase();
    for (pattern, module) in MODULE_PATTERNS {
        if haystack.contains(pattern) {
            return (*module).to_string();
        }
    }
    UNKNOWN_MODULE.to_string()
}
