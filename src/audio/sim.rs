use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::capture::{AudioCapturing, AudioChunk, AudioLevels};
use crate::error::SessionError;

/// Synthetic tone capture used by the demo binary and tests.
///
/// Emits 100 ms chunks of a low-amplitude sine tone on a steady clock.
/// Pause suppresses chunk delivery without stopping the clock, matching
/// how a real device pause behaves.
pub struct SimulatedCapture {
    sample_rate: u32,
    channels: u16,
    chunk_interval: Duration,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    levels: Arc<Mutex<AudioLevels>>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedCapture {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            chunk_interval: Duration::from_millis(100),
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            levels: Arc::new(Mutex::new(AudioLevels::default())),
            task: None,
        }
    }
}

#[async_trait]
impl AudioCapturing for SimulatedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, SessionError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SessionError::AudioCaptureFailed(
                "capture already running".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        self.running.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let paused = Arc::clone(&self.paused);
        let levels = Arc::clone(&self.levels);
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let interval = self.chunk_interval;

        self.task = Some(tokio::spawn(async move {
            let samples_per_chunk =
                (sample_rate as u64 * interval.as_millis() as u64 / 1000) as usize;
            let mut timestamp_ms = 0u64;
            let mut phase = 0.0f32;
            let mut ticker = tokio::time::interval(interval);

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;

                if paused.load(Ordering::SeqCst) {
                    *levels.lock().expect("levels lock poisoned") = AudioLevels::default();
                    timestamp_ms += interval.as_millis() as u64;
                    continue;
                }

                // 220 Hz tone at 20% full scale.
                let step = 220.0 * std::f32::consts::TAU / sample_rate as f32;
                let samples: Vec<i16> = (0..samples_per_chunk * channels as usize)
                    .map(|_| {
                        phase += step;
                        (phase.sin() * 0.2 * i16::MAX as f32) as i16
                    })
                    .collect();

                *levels.lock().expect("levels lock poisoned") = AudioLevels {
                    peak: 0.2,
                    rms: 0.14,
                };

                let chunk = AudioChunk {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                timestamp_ms += interval.as_millis() as u64;

                if tx.send(chunk).await.is_err() {
                    break;
                }
            }

            debug!("simulated capture task exited");
        }));

        Ok(rx)
    }

    async fn pause(&mut self) -> Result<(), SessionError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SessionError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self.levels.lock().expect("levels lock poisoned") = AudioLevels::default();
        Ok(())
    }

    fn audio_levels(&self) -> AudioLevels {
        *self.levels.lock().expect("levels lock poisoned")
    }
}
