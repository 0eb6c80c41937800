use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionMode;
use crate::transcription::{FinalizationReason, Speaker, TranscriptionSegment};

/// One finalized, persisted transcript unit tied to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub id: Uuid,
    pub text: String,
    pub speaker: Speaker,
    pub confidence: f32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub finalization_reason: FinalizationReason,
}

impl From<TranscriptionSegment> for Utterance {
    fn from(segment: TranscriptionSegment) -> Self {
        Self {
            id: segment.id,
            text: segment.text,
            speaker: segment.speaker,
            confidence: segment.confidence,
            started_at: segment.started_at,
            ended_at: segment.ended_at,
            finalization_reason: segment.reason,
        }
    }
}

/// The session aggregate as persisted in the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub mode: SessionMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_seconds: Option<u64>,
    pub participant_name: Option<String>,
    pub project_name: Option<String>,
    pub utterances: Vec<Utterance>,
}
