// Tests for transcript assembly: cumulative partials, speaker switches,
// runaway-partial timeouts, minimum-length filtering, and manual flush.

use chrono::{DateTime, Duration, Utc};
use interview_live::{FinalizationReason, Speaker, TranscriptionBuffer, TranscriptionEvent};

fn event(
    text: &str,
    is_final: bool,
    speaker: Option<Speaker>,
    confidence: Option<f32>,
    at: DateTime<Utc>,
) -> TranscriptionEvent {
    TranscriptionEvent {
        text: text.to_string(),
        is_final,
        speaker,
        confidence,
        timestamp: at,
    }
}

#[test]
fn test_cumulative_partials_finalize_once() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();
    let speaker = Some(Speaker::Participant);

    assert!(buffer
        .ingest(&event("Hel", false, speaker, None, t0))
        .is_empty());
    assert!(buffer
        .ingest(&event(
            "Hello there",
            false,
            speaker,
            None,
            t0 + Duration::seconds(1)
        ))
        .is_empty());

    let stored = buffer.ingest(&event(
        "Hello there.",
        true,
        speaker,
        Some(0.95),
        t0 + Duration::seconds(2),
    ));

    assert_eq!(stored.len(), 1);
    let segment = &stored[0];
    assert_eq!(segment.text, "Hello there.");
    assert_eq!(segment.speaker, Speaker::Participant);
    assert_eq!(segment.reason, FinalizationReason::ApiFinalized);
    assert_eq!(segment.confidence, 0.95);
    assert_eq!(segment.started_at, t0);

    let stats = buffer.statistics();
    assert_eq!(stats.total_partial_events, 2);
    assert_eq!(stats.total_final_events, 1);
    assert_eq!(stats.finalized_segments, 1);
    assert!(!stats.has_pending_partial);
}

#[test]
fn test_speaker_change_finalizes_previous_partial() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();

    buffer.ingest(&event(
        "So tell me about",
        false,
        Some(Speaker::Interviewer),
        None,
        t0,
    ));

    let stored = buffer.ingest(&event(
        "Well",
        false,
        Some(Speaker::Participant),
        Some(0.9),
        t0 + Duration::seconds(2),
    ));

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "So tell me about");
    assert_eq!(stored[0].speaker, Speaker::Interviewer);
    assert_eq!(stored[0].reason, FinalizationReason::SpeakerChange);
    assert_eq!(stored[0].confidence, 0.9);

    // The new speaker's partial is now pending.
    let stats = buffer.statistics();
    assert!(stats.has_pending_partial);
    assert_eq!(stats.finalized_segments, 1);
}

#[test]
fn test_runaway_partial_times_out() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();
    let speaker = Some(Speaker::Participant);

    buffer.ingest(&event("I kept talking", false, speaker, None, t0));

    // Next partial arrives 31 seconds after the first: the old partial is
    // force-finalized before the new one begins.
    let stored = buffer.ingest(&event(
        "new thought",
        false,
        speaker,
        None,
        t0 + Duration::seconds(31),
    ));

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text, "I kept talking");
    assert_eq!(stored[0].reason, FinalizationReason::Timeout);
    assert_eq!(stored[0].confidence, 0.7);

    let stats = buffer.statistics();
    assert!(stats.has_pending_partial);
}

#[test]
fn test_partial_within_limit_is_replaced_not_finalized() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();
    let speaker = Some(Speaker::Participant);

    buffer.ingest(&event("first", false, speaker, None, t0));
    let stored = buffer.ingest(&event(
        "first second",
        false,
        speaker,
        None,
        t0 + Duration::seconds(29),
    ));

    assert!(stored.is_empty());
    assert_eq!(buffer.statistics().finalized_segments, 0);
}

#[test]
fn test_short_final_is_dropped() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();

    let stored = buffer.ingest(&event("H", true, Some(Speaker::Participant), Some(0.9), t0));

    assert!(stored.is_empty());
    let stats = buffer.statistics();
    assert_eq!(stats.dropped_partials, 1);
    assert_eq!(stats.finalized_segments, 0);
    assert!(buffer.segments().is_empty());
}

#[test]
fn test_flush_finalizes_pending_partial() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();

    buffer.ingest(&event(
        "trailing thought",
        false,
        Some(Speaker::Participant),
        None,
        t0,
    ));

    let flushed = buffer.flush(t0 + Duration::seconds(3));
    let segment = flushed.expect("pending partial should flush");
    assert_eq!(segment.text, "trailing thought");
    assert_eq!(segment.reason, FinalizationReason::ManualFlush);
    assert_eq!(segment.confidence, 0.8);
    assert_eq!(segment.ended_at, t0 + Duration::seconds(3));

    // Nothing left to flush.
    assert!(buffer.flush(t0 + Duration::seconds(4)).is_none());
}

#[test]
fn test_final_without_speaker_uses_tracked_speaker() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();

    buffer.ingest(&event("partial", false, Some(Speaker::Interviewer), None, t0));
    let stored = buffer.ingest(&event(
        "partial done",
        true,
        None,
        Some(0.9),
        t0 + Duration::seconds(1),
    ));

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].speaker, Speaker::Interviewer);
}

#[test]
fn test_final_with_no_speaker_at_all_is_unknown() {
    let mut buffer = TranscriptionBuffer::new();
    let stored = buffer.ingest(&event("hello world", true, None, Some(0.9), Utc::now()));

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].speaker, Speaker::Unknown);
}

#[test]
fn test_clear_resets_everything() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();

    buffer.ingest(&event("some text", false, Some(Speaker::Participant), None, t0));
    buffer.ingest(&event(
        "some text done",
        true,
        Some(Speaker::Participant),
        Some(0.9),
        t0 + Duration::seconds(1),
    ));
    buffer.ingest(&event("x", true, None, None, t0 + Duration::seconds(2)));

    buffer.clear();

    let stats = buffer.statistics();
    assert_eq!(stats.total_partial_events, 0);
    assert_eq!(stats.total_final_events, 0);
    assert_eq!(stats.dropped_partials, 0);
    assert_eq!(stats.finalized_segments, 0);
    assert!(!stats.has_pending_partial);
}

#[test]
fn test_segments_persist_in_finalization_order() {
    let mut buffer = TranscriptionBuffer::new();
    let t0 = Utc::now();

    buffer.ingest(&event(
        "first utterance",
        true,
        Some(Speaker::Interviewer),
        Some(0.9),
        t0,
    ));
    buffer.ingest(&event(
        "second utterance",
        true,
        Some(Speaker::Participant),
        Some(0.9),
        t0 + Duration::seconds(1),
    ));

    let segments = buffer.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].text, "first utterance");
    assert_eq!(segments[1].text, "second utterance");
}
