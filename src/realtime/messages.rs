use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transcription::Speaker;

/// Transcription event received from the realtime service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionEvent {
    /// Cumulative text for the current speaker turn.
    pub text: String,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub speaker: Option<Speaker>,
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

/// Coaching function call emitted by the realtime service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallEvent {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
