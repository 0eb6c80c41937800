use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use super::store::{RecoveryRecord, RecoveryStateStore};
use super::strategy::{
    DegradedMode, RecoveryAction, RecoveryAttempt, RecoveryCondition, RecoveryResult,
    RecoveryStrategy,
};
use crate::error::SessionError;

/// Retry attempts before the service tries to degrade instead.
const MAX_ATTEMPTS: u32 = 3;

/// Exponential backoff base delay.
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Exponential backoff cap.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Fixed delay for the first connect retry and for persistence retries.
const SHORT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Fixed delay for audio capture restarts.
const AUDIO_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How long to wait for an audio device to come back.
const DEVICE_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while waiting on a recovery condition.
const CONDITION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A recovery older than this cannot be resumed.
const RECOVERY_WINDOW_MINUTES: i64 = 30;

/// Performs the side-effecting recovery work on behalf of the service.
///
/// The service owns policy only; reconnecting, restarting capture, and
/// probing device availability are injected through this trait.
#[async_trait]
pub trait RecoveryExecutor: Send + Sync {
    async fn execute(&self, action: RecoveryAction) -> Result<(), SessionError>;

    async fn is_condition_met(&self, condition: RecoveryCondition) -> bool;
}

struct RecoveryState {
    attempt_count: u32,
    is_recovering: bool,
    degraded_mode: Option<DegradedMode>,
    error_occurred_at: Option<DateTime<Utc>>,
    recovering_session_id: Option<String>,
    attempts: Vec<RecoveryAttempt>,
}

/// Stateful per-session recovery policy engine.
///
/// Holds the session's sole recovery state (attempt count, in-flight guard,
/// degraded mode) and persists it after every change so a restart within
/// the 30-minute recovery window can resume the decision.
pub struct SessionRecoveryService {
    state: Mutex<RecoveryState>,
    store: RecoveryStateStore,
}

impl SessionRecoveryService {
    /// Build the service, resuming any persisted recovery state that is
    /// still inside the recovery window.
    pub fn new(store: RecoveryStateStore) -> Self {
        let mut state = RecoveryState {
            attempt_count: 0,
            is_recovering: false,
            degraded_mode: None,
            error_occurred_at: None,
            recovering_session_id: None,
            attempts: Vec::new(),
        };

        if let Some(record) = store.load() {
            let age = Utc::now().signed_duration_since(record.error_occurred_at);
            if age <= chrono::Duration::minutes(RECOVERY_WINDOW_MINUTES) {
                info!(
                    session_id = %record.recovering_session_id,
                    attempts = record.attempt_count,
                    "resuming persisted recovery state"
                );
                state.attempt_count = record.attempt_count;
                state.degraded_mode = record.degraded_mode;
                state.error_occurred_at = Some(record.error_occurred_at);
                state.recovering_session_id = Some(record.recovering_session_id);
            } else {
                info!("persisted recovery state expired, discarding");
                let _ = store.clear();
            }
        }

        Self {
            state: Mutex::new(state),
            store,
        }
    }

    /// Record that a failure occurred for `session_id`, starting the
    /// recovery window if one is not already open.
    pub async fn note_failure(&self, session_id: &str) {
        let mut state = self.state.lock().await;
        if state.error_occurred_at.is_none() {
            state.error_occurred_at = Some(Utc::now());
        }
        state.recovering_session_id = Some(session_id.to_string());
        self.persist(&state);
    }

    /// Whether a recovery for `session_id` may proceed: the tracked session
    /// must match and the error must be younger than the recovery window.
    pub async fn can_recover(&self, session_id: &str) -> bool {
        let state = self.state.lock().await;
        let Some(tracked) = &state.recovering_session_id else {
            return false;
        };
        if tracked != session_id {
            return false;
        }
        match state.error_occurred_at {
            Some(at) => {
                Utc::now().signed_duration_since(at)
                    <= chrono::Duration::minutes(RECOVERY_WINDOW_MINUTES)
            }
            None => false,
        }
    }

    /// Decide how to recover from `error` given the attempts made so far.
    pub async fn determine_strategy(&self, error: &SessionError) -> RecoveryStrategy {
        if !error.is_recoverable() {
            return RecoveryStrategy::Terminate {
                reason: format!("unrecoverable error: {error}"),
            };
        }

        let attempt_count = self.state.lock().await.attempt_count;

        if attempt_count >= MAX_ATTEMPTS {
            return match Self::degraded_mode_for(error) {
                Some(mode) => RecoveryStrategy::Degrade(mode),
                None => RecoveryStrategy::Terminate {
                    reason: format!("recovery attempts exhausted: {error}"),
                },
            };
        }

        match error {
            SessionError::ConnectionLost
            | SessionError::ReconnectionFailed(_)
            | SessionError::ServerError(_) => RecoveryStrategy::Retry {
                delay: self.calculate_backoff_delay(attempt_count),
                action: RecoveryAction::Reconnect,
            },
            SessionError::ConnectionFailed(_) => RecoveryStrategy::Retry {
                // First connect failure is usually transient: retry fast.
                delay: if attempt_count == 0 {
                    SHORT_RETRY_DELAY
                } else {
                    self.calculate_backoff_delay(attempt_count)
                },
                action: RecoveryAction::Reconnect,
            },
            SessionError::AudioCaptureFailed(_) => RecoveryStrategy::Retry {
                delay: AUDIO_RETRY_DELAY,
                action: RecoveryAction::RestartAudio,
            },
            SessionError::AudioDeviceUnavailable => RecoveryStrategy::WaitForCondition {
                condition: RecoveryCondition::AudioDeviceAvailable,
                timeout: DEVICE_WAIT_TIMEOUT,
            },
            SessionError::PersistenceFailed(_) => RecoveryStrategy::Retry {
                delay: SHORT_RETRY_DELAY,
                action: RecoveryAction::RetryPersistence,
            },
            _ => RecoveryStrategy::Terminate {
                reason: format!("no recovery strategy for: {error}"),
            },
        }
    }

    /// Jittered exponential backoff: `base * 2^attempts * jitter`, capped.
    /// Jitter is uniform in [0.5, 1.5].
    pub fn calculate_backoff_delay(&self, attempt_count: u32) -> Duration {
        let exponential = BASE_DELAY.as_secs_f64() * 2f64.powi(attempt_count as i32);
        let jitter = rand::thread_rng().gen_range(0.5..=1.5);
        Duration::from_secs_f64((exponential * jitter).min(MAX_DELAY.as_secs_f64()))
    }

    /// Execute `strategy` against `executor`. At most one recovery runs at
    /// a time; a concurrent call returns `AlreadyRecovering` immediately.
    pub async fn execute_recovery(
        &self,
        strategy: RecoveryStrategy,
        executor: &dyn RecoveryExecutor,
    ) -> RecoveryResult {
        {
            let mut state = self.state.lock().await;
            if state.is_recovering {
                return RecoveryResult::AlreadyRecovering;
            }
            state.is_recovering = true;
        }

        let result = self.run_strategy(strategy, executor).await;

        self.state.lock().await.is_recovering = false;
        result
    }

    async fn run_strategy(
        &self,
        strategy: RecoveryStrategy,
        executor: &dyn RecoveryExecutor,
    ) -> RecoveryResult {
        match strategy {
            RecoveryStrategy::Retry { delay, action } => {
                let attempt = {
                    let mut state = self.state.lock().await;
                    state.attempt_count += 1;
                    let attempt_count = state.attempt_count;
                    state.attempts.push(RecoveryAttempt {
                        attempt: attempt_count,
                        action,
                        delay,
                        at: Utc::now(),
                    });
                    self.persist(&state);
                    state.attempt_count
                };

                info!(attempt, ?action, delay_ms = delay.as_millis() as u64, "retrying");
                sleep(delay).await;

                match executor.execute(action).await {
                    Ok(()) => RecoveryResult::Recovered,
                    Err(e) => {
                        warn!(attempt, error = %e, "recovery attempt failed");
                        RecoveryResult::Failed(e)
                    }
                }
            }

            RecoveryStrategy::Degrade(mode) => {
                let mut state = self.state.lock().await;
                state.degraded_mode = Some(mode);
                self.persist(&state);
                info!(mode = mode.label(), "degrading session");
                RecoveryResult::Degraded(mode)
            }

            RecoveryStrategy::WaitForCondition { condition, timeout } => {
                let deadline = Instant::now() + timeout;
                loop {
                    if executor.is_condition_met(condition).await {
                        let mut state = self.state.lock().await;
                        state.attempt_count = 0;
                        self.persist(&state);
                        info!(?condition, "condition satisfied");
                        return RecoveryResult::Recovered;
                    }
                    if Instant::now() >= deadline {
                        warn!(?condition, "timed out waiting for condition");
                        // A timed-out wait spends an attempt, so repeated
                        // waits eventually degrade instead of looping.
                        let mut state = self.state.lock().await;
                        state.attempt_count += 1;
                        self.persist(&state);
                        return RecoveryResult::Failed(Self::condition_error(condition));
                    }
                    sleep(CONDITION_POLL_INTERVAL).await;
                }
            }

            RecoveryStrategy::Terminate { reason } => {
                warn!(%reason, "terminating session");
                RecoveryResult::Terminated(reason)
            }
        }
    }

    /// Clear all recovery state after the session is healthy again.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.attempt_count = 0;
        state.degraded_mode = None;
        state.error_occurred_at = None;
        state.recovering_session_id = None;
        state.attempts.clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted recovery state");
        }
    }

    /// Reset everything, including the in-flight guard. Used when the
    /// owning session is reset while a recovery task was cancelled.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.attempt_count = 0;
        state.is_recovering = false;
        state.degraded_mode = None;
        state.error_occurred_at = None;
        state.recovering_session_id = None;
        state.attempts.clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted recovery state");
        }
    }

    pub async fn attempt_count(&self) -> u32 {
        self.state.lock().await.attempt_count
    }

    pub async fn is_recovering(&self) -> bool {
        self.state.lock().await.is_recovering
    }

    pub async fn degraded_mode(&self) -> Option<DegradedMode> {
        self.state.lock().await.degraded_mode
    }

    /// Enter a degraded mode chosen by the caller rather than by policy.
    pub async fn set_degraded_mode(&self, mode: DegradedMode) {
        let mut state = self.state.lock().await;
        state.degraded_mode = Some(mode);
        self.persist(&state);
    }

    pub async fn attempts(&self) -> Vec<RecoveryAttempt> {
        self.state.lock().await.attempts.clone()
    }

    fn degraded_mode_for(error: &SessionError) -> Option<DegradedMode> {
        match error {
            SessionError::ConnectionFailed(_)
            | SessionError::ConnectionLost
            | SessionError::ReconnectionFailed(_)
            | SessionError::ServerError(_) => Some(DegradedMode::TranscriptionOnly),
            SessionError::AudioCaptureFailed(_)
            | SessionError::AudioDeviceUnavailable
            | SessionError::MicrophonePermissionDenied => Some(DegradedMode::ManualNotesOnly),
            _ => None,
        }
    }

    fn condition_error(condition: RecoveryCondition) -> SessionError {
        match condition {
            RecoveryCondition::AudioDeviceAvailable => SessionError::AudioDeviceUnavailable,
        }
    }

    /// Persist the durable subset of the state. Persistence failures are
    /// logged, not propagated: losing resumability must not break recovery
    /// itself.
    fn persist(&self, state: &RecoveryState) {
        let Some(session_id) = &state.recovering_session_id else {
            return;
        };
        let Some(error_occurred_at) = state.error_occurred_at else {
            return;
        };
        let record = RecoveryRecord {
            recovering_session_id: session_id.clone(),
            error_occurred_at,
            attempt_count: state.attempt_count,
            degraded_mode: state.degraded_mode,
        };
        if let Err(e) = self.store.save(&record) {
            warn!(error = %e, "failed to persist recovery state");
        }
    }
}
