//! Notification templates.
//!
//! Templates are keyed by `(channel, severity)` and carry `{{variable}}`
//! placeholders. Any combination without an explicit template falls back to
//! the built-in default, so rendering always succeeds with *some* message.

use std::collections::HashMap;

use fault::{Classification, Fault, Severity};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::admin::Channel;
use crate::channels::Message;

const DEFAULT_SUBJECT: &str = "[{{severity}}] {{errorCode}} in {{module}}";
const DEFAULT_BODY: &str = "\
{{errorMessage}}

Code:      {{errorCode}}
Module:    {{module}}
Severity:  {{severity}}
Timestamp: {{timestamp}}

Context:
{{context}}";

const DEFAULT_BATCH_SUBJECT: &str = "{{count}} faults queued for review";
const DEFAULT_BATCH_BODY: &str = "\
{{count}} faults between {{earliest}} and {{latest}}:

{{summary}}";

/// A single template for one `(channel, severity)` combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub channel: Channel,
    pub severity: Severity,
    pub subject: String,
    pub body: String,
    /// Variable names the template expects; informational, used by config
    /// validation tooling.
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Template lookup with explicit-match-then-default resolution.
pub struct TemplateSet {
    templates: HashMap<(Channel, Severity), NotificationTemplate>,
    batch_subject: String,
    batch_body: String,
    registry: Handlebars<'static>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TemplateSet {
    /// Build a set from configured templates.
    #[must_use]
    pub fn new(templates: Vec<NotificationTemplate>) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| ((t.channel, t.severity), t))
            .collect();

        // Messages are plain text, not HTML.
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        Self {
            templates,
            batch_subject: DEFAULT_BATCH_SUBJECT.to_string(),
            batch_body: DEFAULT_BATCH_BODY.to_string(),
            registry,
        }
    }

    /// Render the message for one fault.
    #[must_use]
    pub fn render(&self, channel: Channel, fault: &Fault, classification: &Classification) -> Message {
        let context_pretty = serde_json::to_string_pretty(&fault.context)
            .unwrap_or_else(|_| "{}".to_string());

        let data = json!({
            "errorCode": fault.code,
            "errorMessage": fault.message,
            "module": classification.module,
            "severity": classification.severity.as_str(),
            "category": classification.category.as_str(),
            "timestamp": fault.timestamp.to_rfc3339(),
            "context": context_pretty,
        });

        let (subject_tpl, body_tpl) = self
            .templates
            .get(&(channel, classification.severity))
            .map_or((DEFAULT_SUBJECT, DEFAULT_BODY), |t| {
                (t.subject.as_str(), t.body.as_str())
            });

        Message {
            subject: self.render_str(subject_tpl, &data),
            body: self.render_str(body_tpl, &data),
        }
    }

    /// Render a batch summary message.
    #[must_use]
    pub fn render_batch(
        &self,
        count: usize,
        summary: &str,
        earliest: &str,
        latest: &str,
    ) -> Message {
        let data = json!({
            "count": count,
            "summary": summary,
            "earliest": earliest,
            "latest": latest,
        });

        Message {
            subject: self.render_str(&self.batch_subject, &data),
            body: self.render_str(&self.batch_body, &data),
        }
    }

    fn render_str(&self, template: &str, data: &serde_json::Value) -> String {
        self.registry
            .render_template(template, data)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Template rendering failed, using raw template");
                template.to_string()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault::classify;

    #[test]
    fn test_default_template_substitutes_fault_fields() {
        let set = TemplateSet::default();
        let fault = Fault::new("POS_OFFLINE", "register unreachable")
            .with_module("pos")
            .with_severity(Severity::High)
            .with_context("store_id", "S-104");
        let classification = classify(&fault);

        let message = set.render(Channel::Email, &fault, &classification);
        assert_eq!(message.subject, "[high] POS_OFFLINE in pos");
        assert!(message.body.contains("register unreachable"));
        assert!(message.body.contains("\"store_id\": \"S-104\""));
    }

    #[test]
    fn test_explicit_template_wins_over_default() {
        let set = TemplateSet::new(vec![NotificationTemplate {
            channel: Channel::Sms,
            severity: Severity::Critical,
            subject: "CRIT {{errorCode}}".to_string(),
            body: "{{errorMessage}}".to_string(),
            variables: vec!["errorCode".to_string(), "errorMessage".to_string()],
        }]);

        let fault = Fault::new("DB_DOWN", "primary lost").with_severity(Severity::Critical);
        let classification = classify(&fault);

        let sms = set.render(Channel::Sms, &fault, &classification);
        assert_eq!(sms.subject, "CRIT DB_DOWN");
        assert_eq!(sms.body, "primary lost");

        // Same severity on another channel still falls back.
        let email = set.render(Channel::Email, &fault, &classification);
        assert!(email.subject.starts_with("[critical]"));
    }

    #[test]
    fn test_batch_rendering() {
        let set = TemplateSet::default();
        let message = set.render_batch(3, "POS_OFFLINE: 2\nHR_SYNC: 1", "t0", "t1");
        assert_eq!(message.subject, "3 faults queued for review");
        assert!(message.body.contains("POS_OFFLINE: 2"));
        assert!(message.body.contains("between t0 and t1"));
    }
}
