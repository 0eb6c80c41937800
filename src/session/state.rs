use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;

/// Lifecycle state of a session, mutated only through the manager's
/// transition function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Configuring,
    Ready,
    Running,
    Paused,
    Ending,
    Ended,
    /// Recoverable failure; the recovery service is (or can be) working.
    Error(SessionError),
    /// Terminal failure; only `reset()` leaves this state.
    Failed(SessionError),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Ready => "ready",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Ending => "ending",
            SessionState::Ended => "ended",
            SessionState::Error(_) => "error",
            SessionState::Failed(_) => "failed",
        }
    }

    /// The valid-transition table. Anything not listed here is illegal and
    /// must be dropped (and logged) by the transition function.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Configuring)
                | (Configuring, Ready)
                | (Configuring, Failed(_))
                | (Ready, Running)
                | (Ready, Ending)
                | (Ready, Failed(_))
                | (Running, Paused)
                | (Running, Ending)
                | (Running, Error(_))
                | (Running, Failed(_))
                | (Paused, Running)
                | (Paused, Ending)
                | (Paused, Error(_))
                | (Paused, Failed(_))
                | (Error(_), Running)
                | (Error(_), Ending)
                | (Error(_), Error(_))
                | (Error(_), Failed(_))
                | (Error(_), Idle)
                | (Ending, Ended)
                | (Ending, Failed(_))
                | (Ended, Idle)
                | (Failed(_), Idle)
        )
    }

    /// Terminal states require a `reset()` to leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Failed(_))
    }

    /// States from which `end()` may be called.
    pub fn can_end(&self) -> bool {
        matches!(
            self,
            SessionState::Ready
                | SessionState::Running
                | SessionState::Paused
                | SessionState::Error(_)
        )
    }

    /// States from which `reset()` may be called.
    pub fn can_reset(&self) -> bool {
        matches!(
            self,
            SessionState::Ended | SessionState::Error(_) | SessionState::Failed(_)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One applied state change, kept in the manager's in-memory history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    /// Human-readable reason for the change.
    pub reason: String,
    pub at: DateTime<Utc>,
}
