use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::client::{ConnectionState, RealtimeAPIConnecting, StreamingError};
use super::messages::{FunctionCallEvent, TranscriptionEvent};
use crate::audio::AudioChunk;
use crate::error::SessionError;
use crate::session::SessionConfig;

/// Channel capacity for the simulated event streams.
const STREAM_CAPACITY: usize = 64;

struct SimShared {
    sent_chunks: AtomicUsize,
    connect_attempts: AtomicUsize,
    failing_connects: AtomicUsize,
    queued_send_errors: Mutex<VecDeque<StreamingError>>,
    transcription_tx: Mutex<Option<mpsc::Sender<TranscriptionEvent>>>,
    function_tx: Mutex<Option<mpsc::Sender<FunctionCallEvent>>>,
}

/// In-memory stand-in for the realtime transcription service.
///
/// Two modes: a script of transcription events replayed on a fixed interval
/// after `connect` (demo binary), or push-style injection through a
/// [`SimulatedRealtimeHandle`] (tests). Chunks accepted by `send` are
/// counted, and connect/send failures can be queued to exercise the
/// recovery paths.
pub struct SimulatedRealtimeClient {
    state: ConnectionState,
    script: Vec<TranscriptionEvent>,
    script_interval: Duration,
    shared: Arc<SimShared>,
    transcription_rx: Option<mpsc::Receiver<TranscriptionEvent>>,
    function_rx: Option<mpsc::Receiver<FunctionCallEvent>>,
    replay_task: Option<JoinHandle<()>>,
}

/// Test-side handle for injecting events and failures into a
/// [`SimulatedRealtimeClient`].
#[derive(Clone)]
pub struct SimulatedRealtimeHandle {
    shared: Arc<SimShared>,
}

impl SimulatedRealtimeClient {
    /// Client with no scripted events; drive it through the handle.
    pub fn new() -> (Self, SimulatedRealtimeHandle) {
        Self::scripted(Vec::new(), Duration::from_millis(50))
    }

    /// Client that replays `script` on `interval` after every connect.
    pub fn scripted(
        script: Vec<TranscriptionEvent>,
        interval: Duration,
    ) -> (Self, SimulatedRealtimeHandle) {
        let shared = Arc::new(SimShared {
            sent_chunks: AtomicUsize::new(0),
            connect_attempts: AtomicUsize::new(0),
            failing_connects: AtomicUsize::new(0),
            queued_send_errors: Mutex::new(VecDeque::new()),
            transcription_tx: Mutex::new(None),
            function_tx: Mutex::new(None),
        });

        let client = Self {
            state: ConnectionState::Disconnected,
            script,
            script_interval: interval,
            shared: Arc::clone(&shared),
            transcription_rx: None,
            function_rx: None,
            replay_task: None,
        };

        (client, SimulatedRealtimeHandle { shared })
    }
}

#[async_trait]
impl RealtimeAPIConnecting for SimulatedRealtimeClient {
    fn connection_state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self, config: &SessionConfig) -> Result<(), SessionError> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self.shared.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.shared.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(SessionError::ConnectionFailed(
                "simulated connect failure".to_string(),
            ));
        }

        info!(session_id = %config.session_id, "simulated realtime client connected");

        let (t_tx, t_rx) = mpsc::channel(STREAM_CAPACITY);
        let (f_tx, f_rx) = mpsc::channel(STREAM_CAPACITY);

        *self.shared.transcription_tx.lock().expect("sim lock poisoned") = Some(t_tx.clone());
        *self.shared.function_tx.lock().expect("sim lock poisoned") = Some(f_tx);
        self.transcription_rx = Some(t_rx);
        self.function_rx = Some(f_rx);

        if !self.script.is_empty() {
            let script = self.script.clone();
            let interval = self.script_interval;
            self.replay_task = Some(tokio::spawn(async move {
                for event in script {
                    tokio::time::sleep(interval).await;
                    if t_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }));
        }

        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn send(&mut self, _chunk: &AudioChunk) -> Result<(), StreamingError> {
        if self.state != ConnectionState::Connected {
            return Err(StreamingError::NotConnected);
        }

        let queued = self
            .shared
            .queued_send_errors
            .lock()
            .expect("sim lock poisoned")
            .pop_front();
        if let Some(err) = queued {
            return Err(err);
        }

        self.shared.sent_chunks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn transcription_events(
        &mut self,
    ) -> Result<mpsc::Receiver<TranscriptionEvent>, SessionError> {
        self.transcription_rx.take().ok_or_else(|| {
            SessionError::MissingDependency("transcription stream already taken".to_string())
        })
    }

    fn function_calls(&mut self) -> Result<mpsc::Receiver<FunctionCallEvent>, SessionError> {
        self.function_rx.take().ok_or_else(|| {
            SessionError::MissingDependency("function call stream already taken".to_string())
        })
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        if let Some(task) = self.replay_task.take() {
            task.abort();
        }
        // Dropping the senders closes both event streams.
        *self.shared.transcription_tx.lock().expect("sim lock poisoned") = None;
        *self.shared.function_tx.lock().expect("sim lock poisoned") = None;
        self.transcription_rx = None;
        self.function_rx = None;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }
}

impl SimulatedRealtimeHandle {
    /// Push a transcription event into the connected client's stream.
    /// Returns false if the client is not connected.
    pub async fn emit_transcription(&self, event: TranscriptionEvent) -> bool {
        let tx = self
            .shared
            .transcription_tx
            .lock()
            .expect("sim lock poisoned")
            .clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Push a coaching function call into the connected client's stream.
    pub async fn emit_function_call(&self, event: FunctionCallEvent) -> bool {
        let tx = self
            .shared
            .function_tx
            .lock()
            .expect("sim lock poisoned")
            .clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Number of audio chunks accepted so far.
    pub fn sent_chunks(&self) -> usize {
        self.shared.sent_chunks.load(Ordering::SeqCst)
    }

    /// Number of connect attempts made, including failed ones.
    pub fn connect_attempts(&self) -> usize {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.shared.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Queue a streaming error to be returned by an upcoming `send`.
    pub fn queue_send_error(&self, err: StreamingError) {
        self.shared
            .queued_send_errors
            .lock()
            .expect("sim lock poisoned")
            .push_back(err);
    }
}
