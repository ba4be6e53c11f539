//! Recovery strategies and outcomes.

use std::collections::HashMap;

use async_trait::async_trait;
use fault::Fault;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open key/value context handed to a strategy alongside the fault.
pub type RecoveryContext = HashMap<String, Value>;

/// What happened when a recovery was attempted.
///
/// Every attempt ends in exactly one of these. `recover` and `fallback`
/// encode their own internal failures as `Unrecovered` instead of erroring;
/// nothing a strategy does may escape into the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The primary action remediated the fault.
    Recovered { detail: String },
    /// The primary action failed but the fallback made forward progress.
    FallbackApplied { detail: String },
    /// Nothing helped; a human gets told.
    Unrecovered { detail: String },
}

impl RecoveryOutcome {
    #[must_use]
    pub fn recovered(detail: impl Into<String>) -> Self {
        Self::Recovered {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn fallback_applied(detail: impl Into<String>) -> Self {
        Self::FallbackApplied {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn unrecovered(detail: impl Into<String>) -> Self {
        Self::Unrecovered {
            detail: detail.into(),
        }
    }

    /// Whether the attempt made forward progress (primary or fallback).
    #[must_use]
    pub const fn resolved(&self) -> bool {
        matches!(self, Self::Recovered { .. } | Self::FallbackApplied { .. })
    }
}

/// Pluggable remediation logic for one error code.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Pure predicate: can this particular fault be recovered automatically?
    ///
    /// Commonly checks the fault's `retryable` context flag and its shape.
    fn can_recover(&self, fault: &Fault) -> bool;

    /// Best-effort remediation, e.g. switching to an alternate downstream
    /// system or enqueueing the work for manual processing.
    async fn recover(&self, fault: &Fault, ctx: &RecoveryContext) -> RecoveryOutcome;

    /// Last-resort action when `recover` could not help, e.g. persisting an
    /// offline record. `None` means this strategy has no fallback.
    async fn fallback(&self, _fault: &Fault, _ctx: &RecoveryContext) -> Option<RecoveryOutcome> {
        None
    }
}

type CanRecoverFn = dyn Fn(&Fault) -> bool + Send + Sync;
type RecoverFn = dyn Fn(&Fault, &RecoveryContext) -> RecoveryOutcome + Send + Sync;

/// Closure-based strategy, used by configuration wiring and tests.
pub struct FnStrategy {
    can_recover: Box<CanRecoverFn>,
    recover: Box<RecoverFn>,
    fallback: Option<Box<RecoverFn>>,
}

impl FnStrategy {
    /// Build a strategy from a predicate and a primary action.
    #[must_use]
    pub fn new(
        can_recover: impl Fn(&Fault) -> bool + Send + Sync + 'static,
        recover: impl Fn(&Fault, &RecoveryContext) -> RecoveryOutcome + Send + Sync + 'static,
    ) -> Self {
        Self {
            can_recover: Box::new(can_recover),
            recover: Box::new(recover),
            fallback: None,
        }
    }

    /// Build a strategy gated on the fault's `retryable` context flag.
    #[must_use]
    pub fn for_retryable(
        recover: impl Fn(&Fault, &RecoveryContext) -> RecoveryOutcome + Send + Sync + 'static,
    ) -> Self {
        Self::new(Fault::retryable, recover)
    }

    /// Attach a fallback action.
    #[must_use]
    pub fn with_fallback(
        mut self,
        fallback: impl Fn(&Fault, &RecoveryContext) -> RecoveryOutcome + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }
}

#[async_trait]
impl RecoveryStrategy for FnStrategy {
    fn can_recover(&self, fault: &Fault) -> bool {
        (self.can_recover)(fault)
    }

    async fn recover(&self, fault: &Fault, ctx: &RecoveryContext) -> RecoveryOutcome {
        (self.recover)(fault, ctx)
    }

    async fn fallback(&self, fault: &Fault, ctx: &RecoveryContext) -> Option<RecoveryOutcome> {
        self.fallback.as_ref().map(|f| f(fault, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_strategy_for_retryable() {
        let strategy =
            FnStrategy::for_retryable(|_, _| RecoveryOutcome::recovered("switched backend"));

        let plain = Fault::new("X", "m");
        assert!(!strategy.can_recover(&plain));

        let retryable = Fault::new("X", "m").with_context("retryable", true);
        assert!(strategy.can_recover(&retryable));

        let outcome = strategy.recover(&retryable, &RecoveryContext::new()).await;
        assert!(outcome.resolved());
    }

    #[tokio::test]
    async fn test_fallback_is_optional() {
        let bare = FnStrategy::new(|_| true, |_, _| RecoveryOutcome::unrecovered("no"));
        assert!(bare
            .fallback(&Fault::new("X", "m"), &RecoveryContext::new())
            .await
            .is_none());

        let with = bare.with_fallback(|_, _| RecoveryOutcome::fallback_applied("queued offline"));
        let outcome = with
            .fallback(&Fault::new("X", "m"), &RecoveryContext::new())
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::fallback_applied("queued offline"));
    }
}
