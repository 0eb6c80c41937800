use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SessionError;

/// What kind of session is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// A live interview with a participant.
    Interview,
    /// A practice run for the interviewer, no participant.
    Practice,
    /// Realtime coaching enabled on top of transcription.
    Coaching,
}

/// Optional descriptive metadata attached to a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub participant_name: Option<String>,
    pub project_name: Option<String>,
    pub planned_duration: Option<Duration>,
}

/// Immutable configuration for one session.
///
/// Built once by the caller before `configure()`; never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Credential for the realtime transcription/coaching service
    pub api_key: String,

    /// System prompt steering the coaching model
    pub system_prompt: String,

    /// Interview topics the coach should track
    pub topics: Vec<String>,

    /// Session mode
    pub mode: SessionMode,

    /// Optional descriptive metadata
    pub metadata: SessionMetadata,
}

impl SessionConfig {
    /// Validate before use. Called by `configure()`.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.session_id.is_empty() {
            return Err(SessionError::InvalidConfiguration(
                "session_id must not be empty".to_string(),
            ));
        }
        if self.api_key.is_empty() {
            return Err(SessionError::InvalidConfiguration(
                "api_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("interview-{}", uuid::Uuid::new_v4()),
            api_key: String::new(),
            system_prompt: String::new(),
            topics: Vec::new(),
            mode: SessionMode::Interview,
            metadata: SessionMetadata::default(),
        }
    }
}
