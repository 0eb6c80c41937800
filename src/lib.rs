pub mod audio;
pub mod config;
pub mod connection;
pub mod error;
pub mod persistence;
pub mod realtime;
pub mod recovery;
pub mod session;
pub mod transcription;

pub use audio::{AudioCapturing, AudioChunk, AudioLevels, SimulatedCapture};
pub use config::Config;
pub use connection::{ConnectionQuality, ConnectionQualityMonitor, ConnectionStatistics};
pub use error::SessionError;
pub use persistence::{JsonFileRepository, SessionRecord, SessionRepository, Utterance};
pub use realtime::{
    ConnectionState, FunctionCallEvent, RealtimeAPIConnecting, SimulatedRealtimeClient,
    StreamingError, TranscriptionEvent,
};
pub use recovery::{
    DegradedMode, RecoveryAction, RecoveryResult, RecoveryStateStore, RecoveryStrategy,
    SessionRecoveryService,
};
pub use session::{
    SessionBackendFactory, SessionConfig, SessionManager, SessionMode, SessionSnapshot,
    SessionState, SessionStatistics,
};
pub use transcription::{
    BufferStatistics, FinalizationReason, Speaker, TranscriptionBuffer, TranscriptionSegment,
};
