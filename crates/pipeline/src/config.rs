//! Pipeline configuration and per-environment presets.

use std::collections::HashMap;

use fault::Severity;
use notify::{Administrator, EscalationRule, NotificationTemplate, NotifierConfig};
use recovery::RetryPolicy;
use serde::{Deserialize, Serialize};
use sink::SinkConfig;

/// Logging flags, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_true")]
    pub enable_console_logging: bool,
    #[serde(default = "default_true")]
    pub enable_database_logging: bool,
    #[serde(default)]
    pub enable_external_logging: bool,
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_api_key: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> Severity {
    Severity::Low
}

fn default_max_log_entries() -> usize {
    1000
}

fn default_retention_days() -> i64 {
    30
}

fn default_flush_interval_secs() -> u64 {
    30
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enable_console_logging: true,
            enable_database_logging: true,
            enable_external_logging: false,
            log_level: default_log_level(),
            max_log_entries: default_max_log_entries(),
            retention_days: default_retention_days(),
            flush_interval_secs: default_flush_interval_secs(),
            external_endpoint: None,
            external_api_key: None,
        }
    }
}

impl LoggingSettings {
    /// Convert into the sink's runtime configuration.
    #[must_use]
    pub fn to_sink_config(&self) -> SinkConfig {
        SinkConfig {
            enable_console_logging: self.enable_console_logging,
            enable_database_logging: self.enable_database_logging,
            enable_external_logging: self.enable_external_logging,
            min_level: self.log_level,
            max_entries: self.max_log_entries,
            retention_days: self.retention_days,
            flush_interval: std::time::Duration::from_secs(self.flush_interval_secs),
            external_endpoint: self.external_endpoint.clone(),
            external_api_key: self.external_api_key.clone(),
        }
    }
}

/// Notification flags, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_hour: u32,
    #[serde(default = "default_true")]
    pub batching_enabled: bool,
    #[serde(default = "default_batching_interval_ms")]
    pub batching_interval_ms: u64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_rate_limit() -> u32 {
    10
}

fn default_batching_interval_ms() -> u64 {
    60_000
}

fn default_max_batch_size() -> usize {
    10
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_per_hour: default_rate_limit(),
            batching_enabled: true,
            batching_interval_ms: default_batching_interval_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl NotificationSettings {
    /// Convert into the dispatcher's runtime configuration.
    #[must_use]
    pub fn to_notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            enabled: self.enabled,
            rate_limit_per_hour: self.rate_limit_per_hour,
            batching_enabled: self.batching_enabled,
            batch_interval: std::time::Duration::from_millis(self.batching_interval_ms),
            max_batch_size: self.max_batch_size,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub administrators: Vec<Administrator>,
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(default)]
    pub templates: Vec<NotificationTemplate>,
    /// One retry policy per business module, handed to the retry
    /// collaborator at startup.
    #[serde(default)]
    pub retry_policies: HashMap<String, RetryPolicy>,
}

impl PipelineConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns the underlying parse error for malformed input.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Preset for the named deployment environment.
    ///
    /// Unknown names fall back to the development preset.
    #[must_use]
    pub fn for_environment(name: &str) -> Self {
        match name {
            "production" => Self::production(),
            "test" => Self::test(),
            _ => Self::development(),
        }
    }

    /// Production: external logging on, higher rate limit, full batching.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LoggingSettings {
                enable_external_logging: true,
                log_level: Severity::Medium,
                ..LoggingSettings::default()
            },
            notifications: NotificationSettings {
                rate_limit_per_hour: 20,
                ..NotificationSettings::default()
            },
            retry_policies: default_retry_policies(),
            ..Self::default()
        }
    }

    /// Development: notifications disabled, console-only logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingSettings {
                enable_database_logging: false,
                ..LoggingSettings::default()
            },
            notifications: NotificationSettings {
                enabled: false,
                ..NotificationSettings::default()
            },
            retry_policies: default_retry_policies(),
            ..Self::default()
        }
    }

    /// Test: quiet console, no batching delay to keep tests fast.
    #[must_use]
    pub fn test() -> Self {
        Self {
            logging: LoggingSettings {
                enable_console_logging: false,
                ..LoggingSettings::default()
            },
            notifications: NotificationSettings {
                batching_interval_ms: 50,
                ..NotificationSettings::default()
            },
            retry_policies: default_retry_policies(),
            ..Self::default()
        }
    }

    /// Configure the external logging endpoint.
    #[must_use]
    pub fn with_external_endpoint(
        mut self,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.logging.enable_external_logging = true;
        self.logging.external_endpoint = Some(endpoint.into());
        self.logging.external_api_key = Some(api_key.into());
        self
    }
}

/// Default retry policies for the business modules, one per module.
#[must_use]
pub fn default_retry_policies() -> HashMap<String, RetryPolicy> {
    let mut policies = HashMap::new();
    for module in ["accounting", "reporting", "pos", "notification"] {
        policies.insert(module.to_string(), RetryPolicy::default());
    }
    policies
}
