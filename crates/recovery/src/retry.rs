//! Contract for the retry/circuit-breaker collaborator.
//!
//! The retry engine that wraps individual operations lives outside this
//! workspace; the pipeline only depends on this trait. Its internal algorithm
//! (backoff curve, breaker transitions, reset semantics) is deliberately
//! unspecified here.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use fault::Fault;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::strategy::RecoveryStrategy;

/// One retryable operation, boxed so executors stay object-safe.
pub type RetryableOperation =
    Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<Value, Fault>> + Send>> + Send + Sync>;

/// Retry policy for one business module, registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Error codes the executor is allowed to retry.
    #[serde(default)]
    pub retryable_codes: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            retryable_codes: Vec::new(),
        }
    }
}

/// Circuit breaker state as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// The retry/circuit-breaker collaborator.
#[async_trait]
pub trait RetryExecutor: Send + Sync {
    /// Execute an operation under the given policy, returning either its
    /// result or the fault that exhausted the retries.
    async fn execute_with_retry(
        &self,
        operation_name: &str,
        operation: RetryableOperation,
        policy: &RetryPolicy,
    ) -> Result<Value, Fault>;

    /// Current breaker state for a named operation.
    async fn breaker_state(&self, operation_name: &str) -> BreakerState;

    /// Force a breaker closed again.
    async fn reset_breaker(&self, operation_name: &str);

    /// Mass-registration hook: the orchestrator hands the executor the full
    /// strategy mapping at startup so retries can attempt recovery between
    /// attempts. Executors that do their own thing may ignore it.
    async fn adopt_strategies(&self, _strategies: HashMap<String, Arc<dyn RecoveryStrategy>>) {}
}
