use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the live-session core.
///
/// Every variant carries a recoverability classification that both the
/// session state machine (`error` vs `failed`) and the recovery service
/// (strategy selection) dispatch on.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SessionError {
    /// A state transition was requested that the transition table forbids.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A collaborator the session needs was never provided.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// The session configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Initial connection to the realtime service failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// An established realtime connection was lost.
    #[error("connection lost")]
    ConnectionLost,

    /// A reconnection attempt failed.
    #[error("reconnection failed: {0}")]
    ReconnectionFailed(String),

    /// The audio capture pipeline reported a failure.
    #[error("audio capture failed: {0}")]
    AudioCaptureFailed(String),

    /// The audio input device disappeared (unplugged, claimed elsewhere).
    #[error("audio device unavailable")]
    AudioDeviceUnavailable,

    /// The user has not granted microphone access.
    #[error("microphone permission denied")]
    MicrophonePermissionDenied,

    /// The realtime service reported a server-side error.
    #[error("server error: {0}")]
    ServerError(String),

    /// Writing session data to the document store failed.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// Anything that does not fit the taxonomy above.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SessionError {
    /// Whether the session can continue after this error.
    ///
    /// Recoverable errors move the session to the `error` state and trigger
    /// the recovery service; unrecoverable ones move it straight to `failed`.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::ConnectionFailed(_)
            | SessionError::ConnectionLost
            | SessionError::ReconnectionFailed(_)
            | SessionError::AudioCaptureFailed(_)
            | SessionError::AudioDeviceUnavailable
            | SessionError::ServerError(_)
            | SessionError::PersistenceFailed(_) => true,
            SessionError::InvalidStateTransition { .. }
            | SessionError::MissingDependency(_)
            | SessionError::InvalidConfiguration(_)
            | SessionError::MicrophonePermissionDenied
            | SessionError::Unknown(_) => false,
        }
    }

    /// Short, user-facing suggestion shown alongside the `error` state.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SessionError::ConnectionFailed(_) => {
                "Could not reach the transcription service. Check your network and retry."
            }
            SessionError::ConnectionLost | SessionError::ReconnectionFailed(_) => {
                "Connection lost. Attempting to reconnect..."
            }
            SessionError::AudioCaptureFailed(_) => {
                "Audio capture stopped. Attempting to restart the microphone..."
            }
            SessionError::AudioDeviceUnavailable => {
                "No audio input device found. Plug in a microphone to continue."
            }
            SessionError::MicrophonePermissionDenied => {
                "Microphone access is denied. Grant permission in system settings."
            }
            SessionError::ServerError(_) => {
                "The transcription service reported an error. Retrying..."
            }
            SessionError::PersistenceFailed(_) => {
                "Could not save session data. Retrying in the background..."
            }
            _ => "An unexpected error occurred. Reset the session to start over.",
        }
    }
}
