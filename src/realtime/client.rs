use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::messages::{FunctionCallEvent, TranscriptionEvent};
use crate::audio::AudioChunk;
use crate::error::SessionError;
use crate::session::SessionConfig;

/// Connection lifecycle of the realtime client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Errors raised while streaming audio to the realtime service.
///
/// `Backpressure` is transient and handled locally by the audio drain;
/// `NotConnected` and `StreamClosed` are fatal for the current connection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamingError {
    #[error("not connected to the realtime service")]
    NotConnected,
    #[error("failed to encode audio chunk: {0}")]
    EncodingFailed(String),
    #[error("transport backpressure")]
    Backpressure,
    #[error("invalid audio format: {0}")]
    InvalidAudioFormat(String),
    #[error("stream closed by the remote end")]
    StreamClosed,
}

/// Realtime transcription/coaching service connection.
///
/// Implementations own the wire protocol. The two event streams are taken
/// once per connection as channel receivers; they close when the client
/// disconnects.
#[async_trait]
pub trait RealtimeAPIConnecting: Send + Sync {
    fn connection_state(&self) -> ConnectionState;

    /// Establish the connection. Fails with `ConnectionFailed`.
    async fn connect(&mut self, config: &SessionConfig) -> Result<(), SessionError>;

    /// Stream one audio chunk to the service.
    async fn send(&mut self, chunk: &AudioChunk) -> Result<(), StreamingError>;

    /// Take the transcription event stream for the current connection.
    fn transcription_events(&mut self)
        -> Result<mpsc::Receiver<TranscriptionEvent>, SessionError>;

    /// Take the coaching function-call stream for the current connection.
    fn function_calls(&mut self) -> Result<mpsc::Receiver<FunctionCallEvent>, SessionError>;

    /// Tear down the connection. Idempotent.
    async fn disconnect(&mut self) -> Result<(), SessionError>;
}
