use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::records::{SessionRecord, Utterance};
use crate::error::SessionError;

/// Document-style store for session aggregates.
///
/// All methods fail with `SessionError::PersistenceFailed`; callers treat
/// persistence failures as reportable but never pipeline-fatal.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create the session document. Fails if the id already exists.
    async fn create_session(&self, record: SessionRecord) -> Result<(), SessionError>;

    /// Append one utterance to the session's transcript.
    async fn append_utterance(
        &self,
        session_id: &str,
        utterance: Utterance,
    ) -> Result<(), SessionError>;

    /// Stamp the session's end time and final duration.
    async fn finalize_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        total_duration_seconds: u64,
    ) -> Result<(), SessionError>;

    /// Flush any buffered writes to durable storage.
    async fn save(&self) -> Result<(), SessionError>;

    /// Read a session document back, if present.
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError>;
}
