//! Fault-handling pipeline facade for the Meridian platform.
//!
//! One [`Pipeline`] is constructed per process at startup and passed by
//! reference into request-handling code; there is no global singleton. It
//! wires the log sink, the recovery registry, and the notification
//! dispatcher together and exposes the end-to-end operations: handle a
//! failing operation, log-only, handle-as-critical, health checks, and
//! merged statistics.
//!
//! The pipeline augments, never suppresses: a handled operation's original
//! error is always re-raised to its caller, and failures inside logging or
//! notification degrade to console diagnostics instead of escalating into a
//! second pipeline invocation.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod health;
pub mod pipeline;
pub mod stats;

pub use config::{LoggingSettings, NotificationSettings, PipelineConfig};
pub use health::{HealthReport, HealthState};
pub use pipeline::Pipeline;
pub use stats::{PipelineStatistics, TopCode};
