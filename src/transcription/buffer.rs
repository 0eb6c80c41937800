use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::segment::{FinalizationReason, PartialTranscription, Speaker, TranscriptionSegment};
use crate::realtime::TranscriptionEvent;

/// Maximum time a partial may accumulate before it is force-finalized.
const MAX_PARTIAL_SECS: i64 = 30;

/// Finalized text shorter than this is discarded as noise.
const MIN_SEGMENT_CHARS: usize = 2;

/// Confidence assigned to segments finalized by the partial timeout.
const TIMEOUT_CONFIDENCE: f32 = 0.7;

/// Confidence assigned to segments finalized by an explicit flush.
const FLUSH_CONFIDENCE: f32 = 0.8;

/// Running counters for one session's transcript assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BufferStatistics {
    pub total_partial_events: u64,
    pub total_final_events: u64,
    pub dropped_partials: u64,
    pub finalized_segments: usize,
    pub has_pending_partial: bool,
}

/// Single-writer accumulator for one session's transcription events.
///
/// Events must be ingested in arrival order by a single consumer; the
/// buffer itself does no locking. `ingest` returns the segments finalized
/// by that event (zero, one, or — on a timeout racing a speaker change —
/// never more than one, since a timeout starts a fresh partial).
pub struct TranscriptionBuffer {
    pending: Option<PartialTranscription>,
    /// Most recent speaker seen on any event, used to attribute final
    /// events that arrive without one.
    current_speaker: Option<Speaker>,
    segments: Vec<TranscriptionSegment>,
    total_partial_events: u64,
    total_final_events: u64,
    dropped_partials: u64,
}

impl TranscriptionBuffer {
    pub fn new() -> Self {
        Self {
            pending: None,
            current_speaker: None,
            segments: Vec::new(),
            total_partial_events: 0,
            total_final_events: 0,
            dropped_partials: 0,
        }
    }

    /// Process one transcription event, returning any segments it finalized
    /// and stored. Dropped (too-short) finalizations are counted but not
    /// returned.
    pub fn ingest(&mut self, event: &TranscriptionEvent) -> Vec<TranscriptionSegment> {
        if let Some(speaker) = event.speaker {
            self.current_speaker = Some(speaker);
        }

        if event.is_final {
            self.total_final_events += 1;
            self.ingest_final(event).into_iter().collect()
        } else {
            self.total_partial_events += 1;
            self.ingest_partial(event).into_iter().collect()
        }
    }

    /// Force-finalize any pending partial, e.g. on session stop.
    pub fn flush(&mut self, at: DateTime<Utc>) -> Option<TranscriptionSegment> {
        let partial = self.pending.take()?;
        debug!(chars = partial.text.chars().count(), "flushing pending partial");
        self.finalize(partial, FinalizationReason::ManualFlush, FLUSH_CONFIDENCE, at)
    }

    /// Reset all buffers and counters for a new session.
    pub fn clear(&mut self) {
        self.pending = None;
        self.current_speaker = None;
        self.segments.clear();
        self.total_partial_events = 0;
        self.total_final_events = 0;
        self.dropped_partials = 0;
    }

    /// Finalized segments so far, in finalization order.
    pub fn segments(&self) -> &[TranscriptionSegment] {
        &self.segments
    }

    pub fn statistics(&self) -> BufferStatistics {
        BufferStatistics {
            total_partial_events: self.total_partial_events,
            total_final_events: self.total_final_events,
            dropped_partials: self.dropped_partials,
            finalized_segments: self.segments.len(),
            has_pending_partial: self.pending.is_some(),
        }
    }

    fn ingest_final(&mut self, event: &TranscriptionEvent) -> Option<TranscriptionSegment> {
        let partial = self.pending.take();
        let (started_at, fallback_confidence) = match &partial {
            Some(p) => (p.started_at, p.confidence),
            None => (event.timestamp, None),
        };

        let speaker = event
            .speaker
            .or_else(|| partial.as_ref().and_then(|p| p.speaker))
            .or(self.current_speaker)
            .unwrap_or(Speaker::Unknown);

        let confidence = event.confidence.or(fallback_confidence).unwrap_or(1.0);

        self.store(TranscriptionSegment {
            id: Uuid::new_v4(),
            text: event.text.clone(),
            speaker,
            confidence,
            started_at,
            ended_at: event.timestamp,
            reason: FinalizationReason::ApiFinalized,
        })
    }

    fn ingest_partial(&mut self, event: &TranscriptionEvent) -> Option<TranscriptionSegment> {
        // Runaway partial: finalize before processing the incoming event.
        let partial_age = self
            .pending
            .as_ref()
            .map(|p| event.timestamp.signed_duration_since(p.started_at));
        if let Some(age) = partial_age {
            if age > Duration::seconds(MAX_PARTIAL_SECS) {
                warn!(
                    age_secs = age.num_seconds(),
                    "partial exceeded maximum duration, force-finalizing"
                );
                let finalized = self.pending.take().and_then(|partial| {
                    self.finalize(
                        partial,
                        FinalizationReason::Timeout,
                        TIMEOUT_CONFIDENCE,
                        event.timestamp,
                    )
                });
                self.begin_partial(event);
                return finalized;
            }
        }

        // Speaker switch: the previous turn is over.
        let speaker_switched = match (&self.pending, event.speaker) {
            (Some(partial), Some(incoming)) => {
                partial.speaker.is_some_and(|current| current != incoming)
            }
            _ => false,
        };
        if speaker_switched {
            let confidence = event.confidence.unwrap_or(FLUSH_CONFIDENCE);
            let finalized = self.pending.take().and_then(|partial| {
                self.finalize(
                    partial,
                    FinalizationReason::SpeakerChange,
                    confidence,
                    event.timestamp,
                )
            });
            self.begin_partial(event);
            return finalized;
        }

        match &mut self.pending {
            Some(partial) => {
                // Cumulative delta: replace, never append.
                partial.text = event.text.clone();
                partial.updated_at = event.timestamp;
                if event.speaker.is_some() {
                    partial.speaker = event.speaker;
                }
                if event.confidence.is_some() {
                    partial.confidence = event.confidence;
                }
            }
            None => self.begin_partial(event),
        }
        None
    }

    fn begin_partial(&mut self, event: &TranscriptionEvent) {
        self.pending = Some(PartialTranscription {
            text: event.text.clone(),
            speaker: event.speaker,
            confidence: event.confidence,
            started_at: event.timestamp,
            updated_at: event.timestamp,
        });
    }

    fn finalize(
        &mut self,
        partial: PartialTranscription,
        reason: FinalizationReason,
        confidence: f32,
        ended_at: DateTime<Utc>,
    ) -> Option<TranscriptionSegment> {
        let speaker = partial
            .speaker
            .or(self.current_speaker)
            .unwrap_or(Speaker::Unknown);

        self.store(TranscriptionSegment {
            id: Uuid::new_v4(),
            text: partial.text,
            speaker,
            confidence,
            started_at: partial.started_at,
            ended_at,
            reason,
        })
    }

    fn store(&mut self, segment: TranscriptionSegment) -> Option<TranscriptionSegment> {
        if segment.text.chars().count() < MIN_SEGMENT_CHARS {
            debug!(reason = ?segment.reason, "dropping segment below minimum length");
            self.dropped_partials += 1;
            return None;
        }
        self.segments.push(segment.clone());
        Some(segment)
    }
}

impl Default for TranscriptionBuffer {
    fn default() -> Self {
        Self::new()
    }
}
