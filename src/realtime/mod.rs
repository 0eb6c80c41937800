//! Realtime transcription/coaching service boundary
//!
//! The session core owns no wire protocol: it talks to the realtime service
//! through the `RealtimeAPIConnecting` trait and consumes its two event
//! streams (transcription events and coaching function calls) as channel
//! receivers. A scripted in-memory client is provided for tests and the
//! demo binary.

mod client;
mod messages;
mod sim;

pub use client::{ConnectionState, RealtimeAPIConnecting, StreamingError};
pub use messages::{FunctionCallEvent, TranscriptionEvent};
pub use sim::{SimulatedRealtimeClient, SimulatedRealtimeHandle};
