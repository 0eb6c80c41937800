use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is speaking in a transcript segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Interviewer,
    Participant,
    Unknown,
}

/// Why a partial transcription was turned into a finalized segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationReason {
    /// The realtime service marked the text final.
    ApiFinalized,
    /// A new event arrived attributed to a different speaker.
    SpeakerChange,
    /// The partial exceeded the maximum partial duration.
    Timeout,
    /// The session flushed the buffer (stop or explicit flush).
    ManualFlush,
}

/// An in-progress transcript fragment for the current speaker turn.
///
/// Mutable and transient: the upstream service sends cumulative text, so
/// each partial event replaces `text` rather than appending to it.
#[derive(Debug, Clone)]
pub struct PartialTranscription {
    pub text: String,
    pub speaker: Option<Speaker>,
    pub confidence: Option<f32>,
    /// When the first partial event of this turn arrived.
    pub started_at: DateTime<Utc>,
    /// When the most recent partial event arrived.
    pub updated_at: DateTime<Utc>,
}

/// An immutable, finalized transcript unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub id: Uuid,
    pub text: String,
    pub speaker: Speaker,
    pub confidence: f32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub reason: FinalizationReason,
}
