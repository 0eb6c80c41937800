use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Audio sample data (16-bit PCM, interleaved).
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Latest input level snapshot, polled for UI display.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AudioLevels {
    /// Peak amplitude in the last chunk, normalized to 0.0..=1.0
    pub peak: f32,
    /// Root-mean-square level of the last chunk, normalized to 0.0..=1.0
    pub rms: f32,
}

/// Audio capture device boundary.
///
/// Implementations own device selection and format conversion. `start`
/// returns a channel receiver of chunks that closes when capture stops;
/// the capture instance is exclusively owned by one session coordinator.
#[async_trait]
pub trait AudioCapturing: Send + Sync {
    /// Begin capturing. Fails with a capture-kind [`SessionError`].
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, SessionError>;

    /// Suspend delivery of chunks without tearing down the device.
    async fn pause(&mut self) -> Result<(), SessionError>;

    /// Resume delivery after a pause.
    async fn resume(&mut self) -> Result<(), SessionError>;

    /// Stop capturing and close the chunk stream.
    async fn stop(&mut self) -> Result<(), SessionError>;

    /// Latest input levels.
    fn audio_levels(&self) -> AudioLevels;

    /// Whether an input device is currently present. Polled by the
    /// recovery service's wait-for-device strategy.
    fn is_device_available(&self) -> bool {
        true
    }
}
