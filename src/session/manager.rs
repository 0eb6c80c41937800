use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::coordinator::{CoordinatorEvent, SessionCoordinator};
use super::state::{SessionState, StateTransition};
use super::stats::SessionStatistics;
use crate::audio::{AudioCapturing, AudioLevels};
use crate::connection::{ConnectionQuality, ConnectionQualityMonitor};
use crate::error::SessionError;
use crate::persistence::{SessionRecord, SessionRepository};
use crate::realtime::{FunctionCallEvent, RealtimeAPIConnecting, TranscriptionEvent};
use crate::recovery::{
    DegradedMode, RecoveryAction, RecoveryCondition, RecoveryExecutor, RecoveryResult,
    SessionRecoveryService,
};

/// Wall-clock tick driving elapsed time and level sampling.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Builds the concrete capture and realtime collaborators for a session.
///
/// Injected so the manager never names a platform backend; the demo binary
/// wires the simulated collaborators through this.
pub trait SessionBackendFactory: Send + Sync {
    fn create_audio(&self) -> Result<Box<dyn AudioCapturing>, SessionError>;

    fn create_realtime(&self) -> Result<Box<dyn RealtimeAPIConnecting>, SessionError>;
}

/// Push-updated read model observed by consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub connection_quality: ConnectionQuality,
    pub audio_levels: AudioLevels,
    pub elapsed_seconds: u64,
    pub degraded_mode: Option<DegradedMode>,
    pub last_error: Option<SessionError>,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            state: SessionState::Idle,
            connection_quality: ConnectionQuality::Fair,
            audio_levels: AudioLevels::default(),
            elapsed_seconds: 0,
            degraded_mode: None,
            last_error: None,
        }
    }
}

struct ManagerState {
    state: SessionState,
    history: Vec<StateTransition>,
    config: Option<SessionConfig>,
    coordinator: Option<Arc<SessionCoordinator>>,
    elapsed_seconds: u64,
    degraded_mode: Option<DegradedMode>,
    last_error: Option<SessionError>,
    tick_task: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
    recovery_task: Option<JoinHandle<()>>,
    updates_rx: Option<mpsc::UnboundedReceiver<TranscriptionEvent>>,
    function_updates_rx: Option<mpsc::UnboundedReceiver<FunctionCallEvent>>,
}

struct ManagerInner {
    state: Mutex<ManagerState>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    backends: Arc<dyn SessionBackendFactory>,
    repository: Arc<dyn SessionRepository>,
    recovery: Arc<SessionRecoveryService>,
    monitor: Arc<ConnectionQualityMonitor>,
}

/// Top-level state machine and public API for one live session.
///
/// Owns a [`SessionCoordinator`] per configured session, reacts to
/// coordinator and connection-quality failures by invoking the recovery
/// service, and exposes the session's observable state as a `watch`-based
/// read model. Manages at most one live session at a time.
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new(
        backends: Arc<dyn SessionBackendFactory>,
        repository: Arc<dyn SessionRepository>,
        recovery: SessionRecoveryService,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::initial());

        Self {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(ManagerState {
                    state: SessionState::Idle,
                    history: Vec::new(),
                    config: None,
                    coordinator: None,
                    elapsed_seconds: 0,
                    degraded_mode: None,
                    last_error: None,
                    tick_task: None,
                    event_task: None,
                    recovery_task: None,
                    updates_rx: None,
                    function_updates_rx: None,
                }),
                snapshot_tx,
                backends,
                repository,
                recovery: Arc::new(recovery),
                monitor: Arc::new(ConnectionQualityMonitor::new()),
            }),
        }
    }

    /// Build and prepare the session. Valid only from `idle`.
    pub async fn configure(&self, config: SessionConfig) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if state.state != SessionState::Idle {
            return Err(invalid_transition(&state.state, "configuring"));
        }
        inner.transition_locked(&mut state, SessionState::Configuring, "configuring session");

        if let Err(e) = config.validate() {
            inner.transition_locked(
                &mut state,
                SessionState::Failed(e.clone()),
                "configuration rejected",
            );
            return Err(e);
        }

        let audio = match inner.backends.create_audio() {
            Ok(audio) => audio,
            Err(e) => {
                inner.transition_locked(
                    &mut state,
                    SessionState::Failed(e.clone()),
                    "audio backend unavailable",
                );
                return Err(e);
            }
        };
        let api = match inner.backends.create_realtime() {
            Ok(api) => api,
            Err(e) => {
                inner.transition_locked(
                    &mut state,
                    SessionState::Failed(e.clone()),
                    "realtime backend unavailable",
                );
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(SessionCoordinator::new(
            config.session_id.clone(),
            audio,
            api,
            Arc::clone(&inner.repository),
            events_tx,
        ));

        if let Err(e) = coordinator.prepare(&config).await {
            inner.transition_locked(
                &mut state,
                SessionState::Failed(e.clone()),
                "coordinator preparation failed",
            );
            return Err(e);
        }

        let record = SessionRecord {
            id: config.session_id.clone(),
            mode: config.mode,
            started_at: Utc::now(),
            ended_at: None,
            total_duration_seconds: None,
            participant_name: config.metadata.participant_name.clone(),
            project_name: config.metadata.project_name.clone(),
            utterances: Vec::new(),
        };
        if let Err(e) = inner.repository.create_session(record).await {
            coordinator.stop().await;
            inner.transition_locked(
                &mut state,
                SessionState::Failed(e.clone()),
                "failed to persist session record",
            );
            return Err(e);
        }

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (function_tx, function_rx) = mpsc::unbounded_channel();
        state.updates_rx = Some(updates_rx);
        state.function_updates_rx = Some(function_rx);
        state.event_task = Some(spawn_event_loop(
            Arc::clone(inner),
            events_rx,
            updates_tx,
            function_tx,
        ));

        state.config = Some(config);
        state.coordinator = Some(coordinator);
        inner.transition_locked(&mut state, SessionState::Ready, "session configured");
        Ok(())
    }

    /// Start capture and the session clock. Valid only from `ready`.
    pub async fn start(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if state.state != SessionState::Ready {
            return Err(invalid_transition(&state.state, "running"));
        }

        let coordinator = state
            .coordinator
            .clone()
            .ok_or_else(|| SessionError::MissingDependency("session coordinator".to_string()))?;

        if let Err(e) = coordinator.start_capture().await {
            inner.transition_locked(
                &mut state,
                SessionState::Failed(e.clone()),
                "audio capture failed to start",
            );
            return Err(e);
        }

        state.tick_task = Some(spawn_tick(Arc::clone(inner)));
        inner.transition_locked(&mut state, SessionState::Running, "session started");
        Ok(())
    }

    /// Suspend capture. Valid only from `running`.
    pub async fn pause(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if state.state != SessionState::Running {
            return Err(invalid_transition(&state.state, "paused"));
        }

        let coordinator = state
            .coordinator
            .clone()
            .ok_or_else(|| SessionError::MissingDependency("session coordinator".to_string()))?;
        coordinator.pause_capture().await?;

        inner.transition_locked(&mut state, SessionState::Paused, "session paused");
        Ok(())
    }

    /// Resume from `paused`, or re-trigger recovery from `error`.
    pub async fn resume(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        match &state.state {
            SessionState::Paused => {
                let coordinator = state.coordinator.clone().ok_or_else(|| {
                    SessionError::MissingDependency("session coordinator".to_string())
                })?;
                coordinator.resume_capture().await?;
                inner.transition_locked(&mut state, SessionState::Running, "session resumed");
                Ok(())
            }
            SessionState::Error(e) => {
                let error = e.clone();
                info!("resume requested from error state, triggering recovery");
                spawn_recovery_locked(inner, &mut state, error);
                Ok(())
            }
            other => Err(invalid_transition(other, "running")),
        }
    }

    /// Manually re-run recovery for the current error. Valid from `error`.
    pub async fn attempt_recovery(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        match &state.state {
            SessionState::Error(e) => {
                let error = e.clone();
                spawn_recovery_locked(inner, &mut state, error);
                Ok(())
            }
            other => Err(invalid_transition(other, "running")),
        }
    }

    /// Give up full capability and keep going in `mode`.
    pub async fn switch_to_degraded_mode(&self, mode: DegradedMode) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        match &state.state {
            SessionState::Running | SessionState::Paused | SessionState::Error(_) => {
                state.degraded_mode = Some(mode);
                inner.recovery.set_degraded_mode(mode).await;
                if matches!(state.state, SessionState::Error(_)) {
                    inner.transition_locked(
                        &mut state,
                        SessionState::Running,
                        &format!("switched to {} mode", mode.label()),
                    );
                } else {
                    inner.publish_snapshot(&state);
                }
                Ok(())
            }
            other => Err(invalid_transition(other, "running")),
        }
    }

    /// Stop the session, persist its final duration, and transition to
    /// `ended`.
    pub async fn end(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if !state.state.can_end() {
            return Err(invalid_transition(&state.state, "ending"));
        }
        inner.transition_locked(&mut state, SessionState::Ending, "ending session");

        if let Some(task) = state.tick_task.take() {
            task.abort();
        }
        if let Some(task) = state.recovery_task.take() {
            task.abort();
        }

        if let Some(coordinator) = &state.coordinator {
            coordinator.stop().await;
        }

        if let Some(config) = &state.config {
            let elapsed = state.elapsed_seconds;
            if let Err(e) = inner
                .repository
                .finalize_session(&config.session_id, Utc::now(), elapsed)
                .await
            {
                warn!(error = %e, "failed to persist final session duration");
                state.last_error = Some(e);
            } else if let Err(e) = inner.repository.save().await {
                warn!(error = %e, "failed to flush session store");
                state.last_error = Some(e);
            }
        }

        // Closing the event loop drops the consumer-stream senders, which
        // ends the finite transcription stream.
        if let Some(task) = state.event_task.take() {
            task.abort();
        }

        inner.transition_locked(&mut state, SessionState::Ended, "session ended");
        Ok(())
    }

    /// Clear all session-scoped state and return to `idle`. Valid from
    /// `ended` and from any error state.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if !state.state.can_reset() {
            return Err(invalid_transition(&state.state, "idle"));
        }

        if let Some(task) = state.recovery_task.take() {
            task.abort();
        }
        if let Some(task) = state.tick_task.take() {
            task.abort();
        }
        if let Some(task) = state.event_task.take() {
            task.abort();
        }
        if let Some(coordinator) = state.coordinator.take() {
            coordinator.stop().await;
        }

        inner.recovery.reset().await;
        inner.monitor.reset();

        state.config = None;
        state.updates_rx = None;
        state.function_updates_rx = None;
        state.elapsed_seconds = 0;
        state.degraded_mode = None;
        state.last_error = None;

        inner.transition_locked(&mut state, SessionState::Idle, "session reset");
        state.history.clear();
        inner.publish_snapshot(&state);
        Ok(())
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.state.lock().await.state.clone()
    }

    /// Subscribe to the push-updated read model.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Latest read-model snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Take the finite stream of transcription updates for the current
    /// session. Closes when the session ends. `None` if not configured or
    /// already taken.
    pub async fn transcription_updates(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<TranscriptionEvent>> {
        self.inner.state.lock().await.updates_rx.take()
    }

    /// Take the finite stream of coaching function calls.
    pub async fn function_call_updates(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<FunctionCallEvent>> {
        self.inner.state.lock().await.function_updates_rx.take()
    }

    /// The applied-transition history with human-readable reasons.
    pub async fn history(&self) -> Vec<StateTransition> {
        self.inner.state.lock().await.history.clone()
    }

    pub async fn elapsed_seconds(&self) -> u64 {
        self.inner.state.lock().await.elapsed_seconds
    }

    pub async fn last_error(&self) -> Option<SessionError> {
        self.inner.state.lock().await.last_error.clone()
    }

    pub async fn degraded_mode(&self) -> Option<DegradedMode> {
        self.inner.state.lock().await.degraded_mode
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        self.inner.monitor.quality()
    }

    /// The monitor fed by the realtime transport with request outcomes.
    pub fn connection_monitor(&self) -> Arc<ConnectionQualityMonitor> {
        Arc::clone(&self.inner.monitor)
    }

    /// Compute a statistics snapshot on demand.
    pub async fn statistics(&self) -> SessionStatistics {
        let state = self.inner.state.lock().await;
        let buffer = match &state.coordinator {
            Some(coordinator) => coordinator.buffer_statistics().await,
            None => Default::default(),
        };

        SessionStatistics {
            state: state.state.name().to_string(),
            elapsed_seconds: state.elapsed_seconds,
            transition_count: state.history.len(),
            recovery_attempts: self.inner.recovery.attempt_count().await,
            degraded_mode: state.degraded_mode,
            buffer,
            connection: self.inner.monitor.statistics(),
        }
    }
}

impl ManagerInner {
    /// Apply a transition if the table allows it; log and drop otherwise.
    /// Returns whether the transition was applied.
    fn transition_locked(
        &self,
        state: &mut ManagerState,
        to: SessionState,
        reason: &str,
    ) -> bool {
        if !state.state.can_transition_to(&to) {
            warn!(
                from = state.state.name(),
                to = to.name(),
                reason,
                "dropping invalid state transition"
            );
            return false;
        }

        info!(from = state.state.name(), to = to.name(), reason, "state transition");

        if let SessionState::Error(e) | SessionState::Failed(e) = &to {
            state.last_error = Some(e.clone());
        }
        state.history.push(StateTransition {
            from: state.state.clone(),
            to: to.clone(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
        state.state = to;
        self.publish_snapshot(state);
        true
    }

    fn publish_snapshot(&self, state: &ManagerState) {
        let audio_levels = state
            .coordinator
            .as_ref()
            .map(|c| c.audio_levels())
            .unwrap_or_default();

        let _ = self.snapshot_tx.send(SessionSnapshot {
            state: state.state.clone(),
            connection_quality: self.monitor.quality(),
            audio_levels,
            elapsed_seconds: state.elapsed_seconds,
            degraded_mode: state.degraded_mode,
            last_error: state.last_error.clone(),
        });
    }
}

fn invalid_transition(from: &SessionState, to: &str) -> SessionError {
    SessionError::InvalidStateTransition {
        from: from.name().to_string(),
        to: to.to_string(),
    }
}

/// Route a steady-state failure into a state transition and, when the
/// error is recoverable, an asynchronous recovery run.
async fn handle_failure(inner: &Arc<ManagerInner>, error: SessionError) {
    let mut state = inner.state.lock().await;

    match &state.state {
        SessionState::Running | SessionState::Paused | SessionState::Error(_) => {
            if error.is_recoverable() {
                inner.transition_locked(
                    &mut state,
                    SessionState::Error(error.clone()),
                    error.recovery_suggestion(),
                );
                spawn_recovery_locked(inner, &mut state, error);
            } else {
                inner.transition_locked(
                    &mut state,
                    SessionState::Failed(error.clone()),
                    "unrecoverable failure",
                );
            }
        }
        other => {
            // Not live: record it, nothing to recover.
            warn!(error = %error, state = other.name(), "failure outside live session");
            state.last_error = Some(error);
            inner.publish_snapshot(&state);
        }
    }
}

/// Spawn the recovery task unless one is already in flight.
fn spawn_recovery_locked(
    inner: &Arc<ManagerInner>,
    state: &mut ManagerState,
    error: SessionError,
) {
    if let Some(task) = &state.recovery_task {
        if !task.is_finished() {
            debug!("recovery task already in flight");
            return;
        }
    }

    let inner = Arc::clone(inner);
    state.recovery_task = Some(tokio::spawn(async move {
        run_recovery(inner, error).await;
    }));
}

/// Drive recovery to a conclusion: repeated strategy rounds until the
/// session recovers, degrades, or terminates. The attempt limit inside
/// the recovery service bounds the loop.
async fn run_recovery(inner: Arc<ManagerInner>, error: SessionError) {
    let (session_id, coordinator, config) = {
        let state = inner.state.lock().await;
        let (Some(config), Some(coordinator)) = (state.config.clone(), state.coordinator.clone())
        else {
            warn!("recovery requested without a configured session");
            return;
        };
        (config.session_id.clone(), coordinator, config)
    };

    let executor = CoordinatorRecoveryExecutor {
        coordinator,
        repository: Arc::clone(&inner.repository),
        config,
    };

    let mut current_error = error;
    loop {
        inner.recovery.note_failure(&session_id).await;

        if !inner.recovery.can_recover(&session_id).await {
            let mut state = inner.state.lock().await;
            inner.transition_locked(
                &mut state,
                SessionState::Failed(current_error.clone()),
                "recovery window expired",
            );
            return;
        }

        let strategy = inner.recovery.determine_strategy(&current_error).await;
        let result = inner.recovery.execute_recovery(strategy, &executor).await;

        match result {
            RecoveryResult::Recovered => {
                inner.recovery.record_success().await;
                let mut state = inner.state.lock().await;
                state.degraded_mode = None;
                state.last_error = None;
                inner.transition_locked(&mut state, SessionState::Running, "recovered");
                return;
            }
            RecoveryResult::Degraded(mode) => {
                let mut state = inner.state.lock().await;
                state.degraded_mode = Some(mode);
                inner.transition_locked(
                    &mut state,
                    SessionState::Running,
                    &format!("degraded to {} mode", mode.label()),
                );
                return;
            }
            RecoveryResult::Failed(next_error) => {
                let mut state = inner.state.lock().await;
                inner.transition_locked(
                    &mut state,
                    SessionState::Error(next_error.clone()),
                    next_error.recovery_suggestion(),
                );
                drop(state);
                current_error = next_error;
            }
            RecoveryResult::Terminated(reason) => {
                let mut state = inner.state.lock().await;
                inner.transition_locked(
                    &mut state,
                    SessionState::Failed(current_error.clone()),
                    &reason,
                );
                return;
            }
            RecoveryResult::AlreadyRecovering => {
                debug!("another recovery already in flight, backing off");
                return;
            }
        }
    }
}

/// Serialized consumer of coordinator events and quality changes.
fn spawn_event_loop(
    inner: Arc<ManagerInner>,
    mut events_rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    updates_tx: mpsc::UnboundedSender<TranscriptionEvent>,
    function_tx: mpsc::UnboundedSender<FunctionCallEvent>,
) -> JoinHandle<()> {
    let mut quality_rx = inner.monitor.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    match event {
                        None => break,
                        Some(CoordinatorEvent::Transcription(update)) => {
                            let _ = updates_tx.send(update);
                        }
                        Some(CoordinatorEvent::FunctionCall(call)) => {
                            let _ = function_tx.send(call);
                        }
                        Some(CoordinatorEvent::Error(error)) => {
                            handle_failure(&inner, error).await;
                        }
                    }
                }
                changed = quality_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let quality = *quality_rx.borrow_and_update();
                    handle_quality_change(&inner, quality).await;
                }
            }
        }
        debug!("manager event loop exited");
    })
}

/// A quality reading of `disconnected` while running is a connection loss.
async fn handle_quality_change(inner: &Arc<ManagerInner>, quality: ConnectionQuality) {
    let lost = {
        let state = inner.state.lock().await;
        inner.publish_snapshot(&state);
        quality == ConnectionQuality::Disconnected
            && matches!(state.state, SessionState::Running)
    };

    if lost {
        warn!("connection quality dropped to disconnected while running");
        handle_failure(inner, SessionError::ConnectionLost).await;
    }
}

/// Per-second session clock: advances elapsed time while running and
/// refreshes the read model (including sampled audio levels).
fn spawn_tick(inner: Arc<ManagerInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.tick().await; // first tick fires immediately

        loop {
            ticker.tick().await;
            let mut state = inner.state.lock().await;
            if matches!(state.state, SessionState::Running) {
                state.elapsed_seconds += 1;
            }
            inner.publish_snapshot(&state);
        }
    })
}

/// Executes recovery actions against the session's own coordinator.
struct CoordinatorRecoveryExecutor {
    coordinator: Arc<SessionCoordinator>,
    repository: Arc<dyn SessionRepository>,
    config: SessionConfig,
}

#[async_trait]
impl RecoveryExecutor for CoordinatorRecoveryExecutor {
    async fn execute(&self, action: RecoveryAction) -> Result<(), SessionError> {
        match action {
            RecoveryAction::Reconnect => self.coordinator.reconnect(&self.config).await,
            RecoveryAction::RestartAudio => self.coordinator.restart_audio().await,
            RecoveryAction::RetryPersistence => self.repository.save().await,
            // Permission grants need user interaction; nothing to execute.
            RecoveryAction::RequestPermissions => Err(SessionError::MicrophonePermissionDenied),
        }
    }

    async fn is_condition_met(&self, condition: RecoveryCondition) -> bool {
        match condition {
            RecoveryCondition::AudioDeviceAvailable => {
                self.coordinator.is_audio_device_available().await
            }
        }
    }
}
