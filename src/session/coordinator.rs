use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use crate::audio::{AudioCapturing, AudioChunk, AudioLevels};
use crate::error::SessionError;
use crate::persistence::{SessionRepository, Utterance};
use crate::realtime::{
    FunctionCallEvent, RealtimeAPIConnecting, StreamingError, TranscriptionEvent,
};
use crate::transcription::{BufferStatistics, TranscriptionBuffer};

/// How often the coordinator samples audio levels for display.
const LEVEL_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Events the coordinator reports upward to the session manager.
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// A transcription event arrived (partial or final).
    Transcription(TranscriptionEvent),
    /// A coaching function call arrived.
    FunctionCall(FunctionCallEvent),
    /// A component failed while the session was live.
    Error(SessionError),
}

#[derive(Default)]
struct CoordinatorTasks {
    transcription_listener: Option<JoinHandle<()>>,
    function_listener: Option<JoinHandle<()>>,
    audio_drain: Option<JoinHandle<()>>,
    level_sampler: Option<JoinHandle<()>>,
}

impl CoordinatorTasks {
    fn abort_listeners(&mut self) {
        if let Some(task) = self.transcription_listener.take() {
            task.abort();
        }
        if let Some(task) = self.function_listener.take() {
            task.abort();
        }
    }

    fn abort_capture(&mut self) {
        if let Some(task) = self.audio_drain.take() {
            task.abort();
        }
        if let Some(task) = self.level_sampler.take() {
            task.abort();
        }
    }
}

/// Owns the audio capture and realtime connections for one session and
/// wires their streams into the transcription buffer and the manager's
/// event channel.
///
/// The collaborators are exclusively owned for the session's lifetime;
/// every access goes through this coordinator.
pub struct SessionCoordinator {
    session_id: String,
    audio: Arc<Mutex<Box<dyn AudioCapturing>>>,
    api: Arc<Mutex<Box<dyn RealtimeAPIConnecting>>>,
    buffer: Arc<Mutex<TranscriptionBuffer>>,
    repository: Arc<dyn SessionRepository>,
    events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    tasks: Mutex<CoordinatorTasks>,
    levels_tx: watch::Sender<AudioLevels>,
    levels_rx: watch::Receiver<AudioLevels>,
}

impl SessionCoordinator {
    pub fn new(
        session_id: String,
        audio: Box<dyn AudioCapturing>,
        api: Box<dyn RealtimeAPIConnecting>,
        repository: Arc<dyn SessionRepository>,
        events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    ) -> Self {
        let (levels_tx, levels_rx) = watch::channel(AudioLevels::default());

        Self {
            session_id,
            audio: Arc::new(Mutex::new(audio)),
            api: Arc::new(Mutex::new(api)),
            buffer: Arc::new(Mutex::new(TranscriptionBuffer::new())),
            repository,
            events_tx,
            tasks: Mutex::new(CoordinatorTasks::default()),
            levels_tx,
            levels_rx,
        }
    }

    /// Connect the realtime client and start the long-lived listener tasks.
    pub async fn prepare(&self, config: &SessionConfig) -> Result<(), SessionError> {
        info!(session_id = %self.session_id, "preparing session coordinator");

        self.api.lock().await.connect(config).await?;
        self.buffer.lock().await.clear();
        self.spawn_listeners().await?;

        Ok(())
    }

    /// Start audio capture and the drain/level-sampling tasks.
    pub async fn start_capture(&self) -> Result<(), SessionError> {
        let chunk_rx = self.audio.lock().await.start().await?;

        let mut tasks = self.tasks.lock().await;
        tasks.audio_drain = Some(self.spawn_audio_drain(chunk_rx));
        tasks.level_sampler = Some(self.spawn_level_sampler());

        info!(session_id = %self.session_id, "audio capture started");
        Ok(())
    }

    pub async fn pause_capture(&self) -> Result<(), SessionError> {
        self.audio.lock().await.pause().await
    }

    pub async fn resume_capture(&self) -> Result<(), SessionError> {
        self.audio.lock().await.resume().await
    }

    /// Stop everything: cancel tasks, flush the pending partial, disconnect
    /// the realtime client, stop capture. Best-effort; failures are logged.
    pub async fn stop(&self) {
        info!(session_id = %self.session_id, "stopping session coordinator");

        {
            let mut tasks = self.tasks.lock().await;
            tasks.abort_capture();
            tasks.abort_listeners();
        }

        // Flush any in-flight partial so the tail of the conversation is
        // not lost, and persist it like any finalized segment.
        let flushed = self.buffer.lock().await.flush(Utc::now());
        if let Some(segment) = flushed {
            let _ = self
                .events_tx
                .send(CoordinatorEvent::Transcription(TranscriptionEvent {
                    text: segment.text.clone(),
                    is_final: true,
                    speaker: Some(segment.speaker),
                    confidence: Some(segment.confidence),
                    timestamp: segment.ended_at,
                }));
            if let Err(e) = self
                .repository
                .append_utterance(&self.session_id, Utterance::from(segment))
                .await
            {
                warn!(error = %e, "failed to persist flushed utterance");
            }
        }

        if let Err(e) = self.audio.lock().await.stop().await {
            warn!(error = %e, "failed to stop audio capture");
        }
        if let Err(e) = self.api.lock().await.disconnect().await {
            warn!(error = %e, "failed to disconnect realtime client");
        }
    }

    /// Cycle the realtime connection and its listener tasks. The
    /// transcription buffer is left untouched so an in-flight partial
    /// survives the reconnect.
    pub async fn reconnect(&self, config: &SessionConfig) -> Result<(), SessionError> {
        info!(session_id = %self.session_id, "reconnecting realtime client");

        self.tasks.lock().await.abort_listeners();

        {
            let mut api = self.api.lock().await;
            let _ = api.disconnect().await;
            api.connect(config)
                .await
                .map_err(|e| SessionError::ReconnectionFailed(e.to_string()))?;
        }

        self.spawn_listeners().await?;
        Ok(())
    }

    /// Tear down and restart audio capture after a capture failure.
    pub async fn restart_audio(&self) -> Result<(), SessionError> {
        info!(session_id = %self.session_id, "restarting audio capture");

        self.tasks.lock().await.abort_capture();

        let chunk_rx = {
            let mut audio = self.audio.lock().await;
            let _ = audio.stop().await;
            audio.start().await?
        };

        let mut tasks = self.tasks.lock().await;
        tasks.audio_drain = Some(self.spawn_audio_drain(chunk_rx));
        tasks.level_sampler = Some(self.spawn_level_sampler());

        Ok(())
    }

    /// Latest sampled input levels.
    pub fn audio_levels(&self) -> AudioLevels {
        *self.levels_rx.borrow()
    }

    pub async fn is_audio_device_available(&self) -> bool {
        self.audio.lock().await.is_device_available()
    }

    pub async fn buffer_statistics(&self) -> BufferStatistics {
        self.buffer.lock().await.statistics()
    }

    async fn spawn_listeners(&self) -> Result<(), SessionError> {
        let (transcription_rx, function_rx) = {
            let mut api = self.api.lock().await;
            (api.transcription_events()?, api.function_calls()?)
        };

        let mut tasks = self.tasks.lock().await;
        tasks.transcription_listener = Some(self.spawn_transcription_listener(transcription_rx));
        tasks.function_listener = Some(self.spawn_function_listener(function_rx));
        Ok(())
    }

    fn spawn_transcription_listener(
        &self,
        mut rx: mpsc::Receiver<TranscriptionEvent>,
    ) -> JoinHandle<()> {
        let buffer = Arc::clone(&self.buffer);
        let repository = Arc::clone(&self.repository);
        let events_tx = self.events_tx.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            info!("transcription listener started");

            // Single consumer: events are ingested strictly in arrival
            // order, and segments persist in finalization order.
            while let Some(event) = rx.recv().await {
                let _ = events_tx.send(CoordinatorEvent::Transcription(event.clone()));

                let stored = buffer.lock().await.ingest(&event);
                for segment in stored {
                    if let Err(e) = repository
                        .append_utterance(&session_id, Utterance::from(segment))
                        .await
                    {
                        warn!(error = %e, "failed to persist utterance");
                        let _ = events_tx.send(CoordinatorEvent::Error(e));
                    }
                }
            }

            info!("transcription listener stopped");
        })
    }

    fn spawn_function_listener(&self, mut rx: mpsc::Receiver<FunctionCallEvent>) -> JoinHandle<()> {
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            info!("function call listener started");

            while let Some(event) = rx.recv().await {
                debug!(name = %event.name, "coaching function call received");
                let _ = events_tx.send(CoordinatorEvent::FunctionCall(event));
            }

            info!("function call listener stopped");
        })
    }

    fn spawn_audio_drain(&self, mut chunk_rx: mpsc::Receiver<AudioChunk>) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            info!("audio drain task started");
            let mut connection_down = false;

            while let Some(chunk) = chunk_rx.recv().await {
                let result = api.lock().await.send(&chunk).await;
                match result {
                    Ok(()) => connection_down = false,
                    Err(StreamingError::Backpressure) => {
                        // Transient: drop the chunk, the stream catches up.
                        debug!("transport backpressure, dropping chunk");
                    }
                    Err(StreamingError::NotConnected) | Err(StreamingError::StreamClosed) => {
                        if !connection_down {
                            connection_down = true;
                            let _ = events_tx
                                .send(CoordinatorEvent::Error(SessionError::ConnectionLost));
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping audio chunk");
                    }
                }
            }

            info!("audio drain task stopped");
        })
    }

    fn spawn_level_sampler(&self) -> JoinHandle<()> {
        let audio = Arc::clone(&self.audio);
        let levels_tx = self.levels_tx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LEVEL_SAMPLE_INTERVAL);
            loop {
                ticker.tick().await;
                let levels = audio.lock().await.audio_levels();
                let _ = levels_tx.send(levels);
            }
        })
    }
}
