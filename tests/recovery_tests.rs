// Tests for the recovery policy engine: strategy selection, jittered
// backoff bounds, the in-flight guard, condition waits, and durable
// resume of recovery state.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

use interview_live::recovery::{
    RecoveryAction, RecoveryCondition, RecoveryExecutor, RecoveryRecord, RecoveryResult,
    RecoveryStateStore, RecoveryStrategy, SessionRecoveryService,
};
use interview_live::{DegradedMode, SessionError};

fn service_at(dir: &Path) -> SessionRecoveryService {
    SessionRecoveryService::new(RecoveryStateStore::new(dir.join("recovery.json")))
}

/// Executor whose reconnects always fail and whose condition never holds.
struct FailingExecutor;

#[async_trait]
impl RecoveryExecutor for FailingExecutor {
    async fn execute(&self, _action: RecoveryAction) -> Result<(), SessionError> {
        Err(SessionError::ReconnectionFailed("still down".to_string()))
    }

    async fn is_condition_met(&self, _condition: RecoveryCondition) -> bool {
        false
    }
}

/// Executor that succeeds, optionally blocking until released.
struct BlockingExecutor {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl RecoveryExecutor for BlockingExecutor {
    async fn execute(&self, _action: RecoveryAction) -> Result<(), SessionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn is_condition_met(&self, _condition: RecoveryCondition) -> bool {
        true
    }
}

/// Executor whose device-availability flag tests can flip.
struct FlagExecutor {
    available: Arc<AtomicBool>,
}

#[async_trait]
impl RecoveryExecutor for FlagExecutor {
    async fn execute(&self, _action: RecoveryAction) -> Result<(), SessionError> {
        Ok(())
    }

    async fn is_condition_met(&self, _condition: RecoveryCondition) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[test]
fn test_backoff_delay_stays_within_jitter_bounds() -> Result<()> {
    let tmp = TempDir::new()?;
    let service = service_at(tmp.path());

    for attempt in 0..=5u32 {
        let base = 2f64.powi(attempt as i32);
        for _ in 0..25 {
            let delay = service.calculate_backoff_delay(attempt).as_secs_f64();
            let lower = (0.5 * base).min(30.0);
            let upper = (1.5 * base).min(30.0);
            assert!(
                delay >= lower - 1e-9 && delay <= upper + 1e-9,
                "attempt {attempt}: delay {delay}s outside [{lower}, {upper}]"
            );
        }
    }

    // Far past the cap, the delay is pinned at the maximum.
    for _ in 0..10 {
        assert!((service.calculate_backoff_delay(12).as_secs_f64() - 30.0).abs() < 1e-9);
    }

    Ok(())
}

#[tokio::test]
async fn test_strategy_dispatch_by_error_kind() -> Result<()> {
    let tmp = TempDir::new()?;
    let service = service_at(tmp.path());

    // Unrecoverable errors terminate immediately.
    assert!(matches!(
        service
            .determine_strategy(&SessionError::InvalidConfiguration("bad".to_string()))
            .await,
        RecoveryStrategy::Terminate { .. }
    ));
    assert!(matches!(
        service
            .determine_strategy(&SessionError::MicrophonePermissionDenied)
            .await,
        RecoveryStrategy::Terminate { .. }
    ));

    // Connection loss backs off exponentially with jitter.
    match service.determine_strategy(&SessionError::ConnectionLost).await {
        RecoveryStrategy::Retry { delay, action } => {
            assert_eq!(action, RecoveryAction::Reconnect);
            let secs = delay.as_secs_f64();
            assert!((0.5..=1.5).contains(&secs), "first backoff was {secs}s");
        }
        other => panic!("expected retry, got {other:?}"),
    }

    // First connect failure retries fast with a fixed delay.
    match service
        .determine_strategy(&SessionError::ConnectionFailed("refused".to_string()))
        .await
    {
        RecoveryStrategy::Retry { delay, action } => {
            assert_eq!(action, RecoveryAction::Reconnect);
            assert_eq!(delay, Duration::from_millis(500));
        }
        other => panic!("expected retry, got {other:?}"),
    }

    match service
        .determine_strategy(&SessionError::AudioCaptureFailed("xrun".to_string()))
        .await
    {
        RecoveryStrategy::Retry { delay, action } => {
            assert_eq!(action, RecoveryAction::RestartAudio);
            assert_eq!(delay, Duration::from_secs(1));
        }
        other => panic!("expected retry, got {other:?}"),
    }

    match service
        .determine_strategy(&SessionError::AudioDeviceUnavailable)
        .await
    {
        RecoveryStrategy::WaitForCondition { condition, timeout } => {
            assert_eq!(condition, RecoveryCondition::AudioDeviceAvailable);
            assert_eq!(timeout, Duration::from_secs(30));
        }
        other => panic!("expected wait-for-condition, got {other:?}"),
    }

    match service
        .determine_strategy(&SessionError::PersistenceFailed("disk".to_string()))
        .await
    {
        RecoveryStrategy::Retry { delay, action } => {
            assert_eq!(action, RecoveryAction::RetryPersistence);
            assert_eq!(delay, Duration::from_millis(500));
        }
        other => panic!("expected retry, got {other:?}"),
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_connection_errors_degrade_after_three_attempts() -> Result<()> {
    let tmp = TempDir::new()?;
    let service = service_at(tmp.path());
    service.note_failure("session-1").await;

    let error = SessionError::ConnectionLost;
    for round in 1..=3 {
        let strategy = service.determine_strategy(&error).await;
        assert!(
            matches!(strategy, RecoveryStrategy::Retry { .. }),
            "round {round} should still retry"
        );
        let result = service.execute_recovery(strategy, &FailingExecutor).await;
        assert!(matches!(result, RecoveryResult::Failed(_)));
    }

    assert_eq!(service.attempt_count().await, 3);
    assert_eq!(
        service.determine_strategy(&error).await,
        RecoveryStrategy::Degrade(DegradedMode::TranscriptionOnly)
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_audio_errors_degrade_to_manual_notes() -> Result<()> {
    let tmp = TempDir::new()?;
    let service = service_at(tmp.path());
    service.note_failure("session-1").await;

    let error = SessionError::AudioCaptureFailed("device gone".to_string());
    for _ in 0..3 {
        let strategy = service.determine_strategy(&error).await;
        let result = service.execute_recovery(strategy, &FailingExecutor).await;
        assert!(matches!(result, RecoveryResult::Failed(_)));
    }

    assert_eq!(
        service.determine_strategy(&error).await,
        RecoveryStrategy::Degrade(DegradedMode::ManualNotesOnly)
    );

    // Executing the degrade records the mode.
    let strategy = service.determine_strategy(&error).await;
    let result = service.execute_recovery(strategy, &FailingExecutor).await;
    assert_eq!(result, RecoveryResult::Degraded(DegradedMode::ManualNotesOnly));
    assert_eq!(
        service.degraded_mode().await,
        Some(DegradedMode::ManualNotesOnly)
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_recovery_returns_already_recovering() -> Result<()> {
    let tmp = TempDir::new()?;
    let service = Arc::new(service_at(tmp.path()));
    service.note_failure("session-1").await;

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let executor = Arc::new(BlockingExecutor {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    });

    let first = {
        let service = Arc::clone(&service);
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            service
                .execute_recovery(
                    RecoveryStrategy::Retry {
                        delay: Duration::from_millis(1),
                        action: RecoveryAction::Reconnect,
                    },
                    executor.as_ref(),
                )
                .await
        })
    };

    // Wait until the first recovery is inside the executor.
    entered.notified().await;
    assert!(service.is_recovering().await);

    let second = service
        .execute_recovery(
            RecoveryStrategy::Retry {
                delay: Duration::from_millis(1),
                action: RecoveryAction::Reconnect,
            },
            &FailingExecutor,
        )
        .await;
    assert_eq!(second, RecoveryResult::AlreadyRecovering);

    release.notify_one();
    assert_eq!(first.await?, RecoveryResult::Recovered);
    assert!(!service.is_recovering().await);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_condition_recovers_and_resets_attempts() -> Result<()> {
    let tmp = TempDir::new()?;
    let service = service_at(tmp.path());
    service.note_failure("session-1").await;

    // Burn one attempt so the reset is observable.
    let result = service
        .execute_recovery(
            RecoveryStrategy::Retry {
                delay: Duration::from_millis(1),
                action: RecoveryAction::RestartAudio,
            },
            &FailingExecutor,
        )
        .await;
    assert!(matches!(result, RecoveryResult::Failed(_)));
    assert_eq!(service.attempt_count().await, 1);

    let available = Arc::new(AtomicBool::new(false));
    let executor = FlagExecutor {
        available: Arc::clone(&available),
    };

    let setter = {
        let available = Arc::clone(&available);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            available.store(true, Ordering::SeqCst);
        })
    };

    let result = service
        .execute_recovery(
            RecoveryStrategy::WaitForCondition {
                condition: RecoveryCondition::AudioDeviceAvailable,
                timeout: Duration::from_secs(30),
            },
            &executor,
        )
        .await;

    setter.await?;
    assert_eq!(result, RecoveryResult::Recovered);
    assert_eq!(service.attempt_count().await, 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_condition_times_out() -> Result<()> {
    let tmp = TempDir::new()?;
    let service = service_at(tmp.path());
    service.note_failure("session-1").await;

    let executor = FlagExecutor {
        available: Arc::new(AtomicBool::new(false)),
    };

    let result = service
        .execute_recovery(
            RecoveryStrategy::WaitForCondition {
                condition: RecoveryCondition::AudioDeviceAvailable,
                timeout: Duration::from_secs(2),
            },
            &executor,
        )
        .await;

    assert_eq!(
        result,
        RecoveryResult::Failed(SessionError::AudioDeviceUnavailable)
    );
    // A timed-out wait spends an attempt.
    assert_eq!(service.attempt_count().await, 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_recovery_state_survives_restart() -> Result<()> {
    let tmp = TempDir::new()?;

    {
        let service = service_at(tmp.path());
        service.note_failure("session-1").await;
        let result = service
            .execute_recovery(
                RecoveryStrategy::Retry {
                    delay: Duration::from_millis(1),
                    action: RecoveryAction::Reconnect,
                },
                &FailingExecutor,
            )
            .await;
        assert!(matches!(result, RecoveryResult::Failed(_)));
        assert_eq!(service.attempt_count().await, 1);
    }

    // A fresh service over the same store resumes the recovery state.
    let resumed = service_at(tmp.path());
    assert_eq!(resumed.attempt_count().await, 1);
    assert!(resumed.can_recover("session-1").await);
    assert!(!resumed.can_recover("some-other-session").await);

    resumed.record_success().await;
    assert_eq!(resumed.attempt_count().await, 0);
    assert!(!resumed.can_recover("session-1").await);

    // After the success, nothing is left to resume.
    let fresh = service_at(tmp.path());
    assert_eq!(fresh.attempt_count().await, 0);
    assert!(!fresh.can_recover("session-1").await);

    Ok(())
}

#[tokio::test]
async fn test_expired_recovery_state_is_discarded() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = RecoveryStateStore::new(tmp.path().join("recovery.json"));

    store.save(&RecoveryRecord {
        recovering_session_id: "session-1".to_string(),
        error_occurred_at: Utc::now() - chrono::Duration::minutes(31),
        attempt_count: 2,
        degraded_mode: None,
    })?;

    let service = service_at(tmp.path());
    assert_eq!(service.attempt_count().await, 0);
    assert!(!service.can_recover("session-1").await);

    Ok(())
}

#[test]
fn test_store_round_trip_and_clear() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = RecoveryStateStore::new(tmp.path().join("recovery.json"));

    assert!(store.load().is_none());

    let record = RecoveryRecord {
        recovering_session_id: "session-1".to_string(),
        error_occurred_at: Utc::now(),
        attempt_count: 2,
        degraded_mode: Some(DegradedMode::TranscriptionOnly),
    };
    store.save(&record)?;
    assert_eq!(store.load(), Some(record));

    store.clear()?;
    assert!(store.load().is_none());

    // Clearing twice is fine.
    store.clear()?;

    Ok(())
}
