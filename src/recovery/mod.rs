//! Failure recovery
//!
//! Stateful per-session recovery policy: given a failure, decide a strategy
//! (retry with backoff, wait for a condition, degrade, terminate) and
//! execute it against an injected executor. Attempt counts and degraded
//! mode persist to a durable record so a process restart within the
//! recovery window can resume the decision.

mod service;
mod store;
mod strategy;

pub use service::{RecoveryExecutor, SessionRecoveryService};
pub use store::{RecoveryRecord, RecoveryStateStore};
pub use strategy::{
    DegradedMode, RecoveryAction, RecoveryAttempt, RecoveryCondition, RecoveryResult,
    RecoveryStrategy,
};
