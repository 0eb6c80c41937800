//! Transcript assembly
//!
//! This module turns the realtime service's stream of partial/final
//! transcription events into finalized, speaker-attributed segments:
//! - Cumulative partial text with replace semantics
//! - Auto-finalization of runaway partials and speaker switches
//! - Minimum-length filtering of finalized text
//! - Running counters for session statistics

mod buffer;
mod segment;

pub use buffer::{BufferStatistics, TranscriptionBuffer};
pub use segment::{FinalizationReason, PartialTranscription, Speaker, TranscriptionSegment};
