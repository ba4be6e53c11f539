//! Log entry types.

use chrono::{DateTime, Utc};
use fault::{Classification, Fault};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-request delivery metadata attached to a log entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl RequestMeta {
    /// Metadata identifying only the user.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// A classified fault plus delivery metadata, as buffered and persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub fault: Fault,
    /// Resolved classification, computed once at logging time.
    pub classification: Classification,
    #[serde(flatten)]
    pub meta: RequestMeta,
    pub logged_at: DateTime<Utc>,
}

impl LogEntry {
    /// Build an entry from an already-classified fault.
    #[must_use]
    pub fn new(fault: Fault, classification: Classification, meta: RequestMeta) -> Self {
        Self {
            id: Uuid::new_v4(),
            fault,
            classification,
            meta,
            logged_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault::classify;

    #[test]
    fn test_entry_serializes_with_flattened_meta() {
        let fault = Fault::new("HR_IMPORT_FAILED", "bad csv");
        let classification = classify(&fault);
        let entry = LogEntry::new(fault, classification, RequestMeta::for_user("u-1"));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["user_id"], "u-1");
        assert_eq!(json["fault"]["code"], "HR_IMPORT_FAILED");
    }
}
