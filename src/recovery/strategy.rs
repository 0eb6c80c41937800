use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SessionError;

/// Side-effecting action a recovery executor can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Cycle the realtime connection.
    Reconnect,
    /// Tear down and restart audio capture.
    RestartAudio,
    /// Re-flush pending persistence writes.
    RetryPersistence,
    /// Prompt the user for missing permissions.
    RequestPermissions,
}

/// Condition a recovery can wait on instead of retrying blindly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryCondition {
    AudioDeviceAvailable,
}

/// Reduced-functionality operating mode used when full capability cannot
/// be restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedMode {
    /// Keep transcribing, drop the coaching features.
    TranscriptionOnly,
    /// Record audio locally, no realtime features.
    LocalRecordingOnly,
    /// No audio at all; the interviewer takes notes by hand.
    ManualNotesOnly,
}

impl DegradedMode {
    pub fn label(&self) -> &'static str {
        match self {
            DegradedMode::TranscriptionOnly => "transcription-only",
            DegradedMode::LocalRecordingOnly => "local-recording-only",
            DegradedMode::ManualNotesOnly => "manual-notes-only",
        }
    }
}

/// Strategy computed per failure by the recovery service.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStrategy {
    Retry {
        delay: Duration,
        action: RecoveryAction,
    },
    Degrade(DegradedMode),
    WaitForCondition {
        condition: RecoveryCondition,
        timeout: Duration,
    },
    Terminate {
        reason: String,
    },
}

/// Outcome of executing a recovery strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryResult {
    Recovered,
    Failed(SessionError),
    Degraded(DegradedMode),
    Terminated(String),
    /// Another recovery attempt is already in flight; this one was not run.
    AlreadyRecovering,
}

/// One executed retry, kept for session statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub attempt: u32,
    pub action: RecoveryAction,
    pub delay: Duration,
    pub at: DateTime<Utc>,
}
