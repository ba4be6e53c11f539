//! Automatic fault recovery for the Meridian platform.
//!
//! A [`RecoveryStrategy`] is pluggable logic keyed by error code: a predicate
//! deciding whether a fault is automatically recoverable, a primary recovery
//! action, and an optional fallback that guarantees forward progress when
//! genuine recovery is impossible. Strategies are registered into a
//! [`RecoveryRegistry`] at startup and may be replaced at runtime (last
//! registration for a code wins).
//!
//! There is no retry loop here. Repetition, backoff, and circuit breaking
//! belong to the retry collaborator, whose contract lives in [`retry`].

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod registry;
pub mod retry;
pub mod strategy;

pub use registry::RecoveryRegistry;
pub use retry::{BreakerState, RetryExecutor, RetryPolicy, RetryableOperation};
pub use strategy::{FnStrategy, RecoveryContext, RecoveryOutcome, RecoveryStrategy};
