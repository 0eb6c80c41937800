//! Live session orchestration
//!
//! This module provides the session lifecycle:
//! - `SessionManager`: the state machine and public API
//! - `SessionCoordinator`: owns the capture and realtime connections and
//!   wires their streams into the transcription buffer
//! - `SessionState` and its valid-transition table
//! - Session configuration and statistics snapshots

mod config;
mod coordinator;
mod manager;
mod state;
mod stats;

pub use config::{SessionConfig, SessionMetadata, SessionMode};
pub use coordinator::{CoordinatorEvent, SessionCoordinator};
pub use manager::{SessionBackendFactory, SessionManager, SessionSnapshot};
pub use state::{SessionState, StateTransition};
pub use stats::SessionStatistics;
