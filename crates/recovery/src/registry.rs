//! The strategy registry.

use std::collections::HashMap;
use std::sync::Arc;

use fault::Fault;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::strategy::{RecoveryContext, RecoveryOutcome, RecoveryStrategy};

/// Maps error codes to recovery strategies.
///
/// Registration is an upsert: registering a second strategy for the same code
/// replaces the first, and `get` never returns a stale strategy.
#[derive(Default)]
pub struct RecoveryRegistry {
    strategies: RwLock<HashMap<String, Arc<dyn RecoveryStrategy>>>,
}

impl RecoveryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the strategy for an error code.
    pub async fn register(&self, code: impl Into<String>, strategy: Arc<dyn RecoveryStrategy>) {
        let code = code.into();
        let replaced = self
            .strategies
            .write()
            .await
            .insert(code.clone(), strategy)
            .is_some();

        if replaced {
            info!(code, "Replaced recovery strategy");
        } else {
            debug!(code, "Registered recovery strategy");
        }
    }

    /// Look up the strategy for an error code.
    pub async fn get(&self, code: &str) -> Option<Arc<dyn RecoveryStrategy>> {
        self.strategies.read().await.get(code).cloned()
    }

    /// Snapshot of the full mapping, for mass-registration with the retry
    /// collaborator at startup.
    pub async fn all(&self) -> HashMap<String, Arc<dyn RecoveryStrategy>> {
        self.strategies.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.strategies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.strategies.read().await.is_empty()
    }

    /// Attempt recovery for a fault.
    ///
    /// No registered strategy, or a declining predicate, is simply
    /// `Unrecovered`. When the primary action fails, the fallback (if any)
    /// gets its chance.
    pub async fn run(&self, fault: &Fault, ctx: &RecoveryContext) -> RecoveryOutcome {
        let Some(strategy) = self.get(&fault.code).await else {
            return RecoveryOutcome::unrecovered("no strategy registered");
        };

        if !strategy.can_recover(fault) {
            return RecoveryOutcome::unrecovered("strategy declined the fault");
        }

        debug!(code = %fault.code, "Attempting automatic recovery");
        let primary = strategy.recover(fault, ctx).await;
        if primary.resolved() {
            info!(code = %fault.code, "Fault recovered automatically");
            return primary;
        }

        if let Some(outcome) = strategy.fallback(fault, ctx).await {
            info!(code = %fault.code, "Fallback recovery applied");
            return outcome;
        }

        primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::FnStrategy;

    #[tokio::test]
    async fn test_registration_is_idempotent_upsert() {
        let registry = RecoveryRegistry::new();
        registry
            .register(
                "POS_OFFLINE",
                Arc::new(FnStrategy::new(
                    |_| true,
                    |_, _| RecoveryOutcome::recovered("first"),
                )),
            )
            .await;
        registry
            .register(
                "POS_OFFLINE",
                Arc::new(FnStrategy::new(
                    |_| true,
                    |_, _| RecoveryOutcome::recovered("second"),
                )),
            )
            .await;

        assert_eq!(registry.len().await, 1);

        let outcome = registry
            .run(&Fault::new("POS_OFFLINE", "m"), &RecoveryContext::new())
            .await;
        assert_eq!(outcome, RecoveryOutcome::recovered("second"));
    }

    #[tokio::test]
    async fn test_run_without_strategy_is_unrecovered() {
        let registry = RecoveryRegistry::new();
        let outcome = registry
            .run(&Fault::new("NOBODY_HOME", "m"), &RecoveryContext::new())
            .await;
        assert!(!outcome.resolved());
    }

    #[tokio::test]
    async fn test_declined_fault_skips_recover() {
        let registry = RecoveryRegistry::new();
        registry
            .register(
                "X",
                Arc::new(FnStrategy::new(
                    |_| false,
                    |_, _| panic!("recover must not run"),
                )),
            )
            .await;

        let outcome = registry
            .run(&Fault::new("X", "m"), &RecoveryContext::new())
            .await;
        assert_eq!(
            outcome,
            RecoveryOutcome::unrecovered("strategy declined the fault")
        );
    }

    #[tokio::test]
    async fn test_failed_primary_falls_back() {
        let registry = RecoveryRegistry::new();
        registry
            .register(
                "ACCOUNTING_EXPORT_FAILED",
                Arc::new(
                    FnStrategy::new(|_| true, |_, _| RecoveryOutcome::unrecovered("primary down"))
                        .with_fallback(|_, _| {
                            RecoveryOutcome::fallback_applied("stored offline record")
                        }),
                ),
            )
            .await;

        let outcome = registry
            .run(
                &Fault::new("ACCOUNTING_EXPORT_FAILED", "m"),
                &RecoveryContext::new(),
            )
            .await;
        assert_eq!(
            outcome,
            RecoveryOutcome::fallback_applied("stored offline record")
        );
    }
}
