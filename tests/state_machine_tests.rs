// Tests for the session state machine's transition table.
//
// Every valid edge is asserted, along with a set of illegal transitions
// that the manager must drop rather than apply.

use interview_live::{SessionError, SessionState};

fn err() -> SessionError {
    SessionError::ConnectionLost
}

#[test]
fn test_valid_transitions() {
    use SessionState::*;

    let valid = [
        (Idle, Configuring),
        (Configuring, Ready),
        (Configuring, Failed(err())),
        (Ready, Running),
        (Ready, Ending),
        (Ready, Failed(err())),
        (Running, Paused),
        (Running, Ending),
        (Running, Error(err())),
        (Running, Failed(err())),
        (Paused, Running),
        (Paused, Ending),
        (Paused, Error(err())),
        (Paused, Failed(err())),
        (Error(err()), Running),
        (Error(err()), Ending),
        (Error(err()), Error(err())),
        (Error(err()), Failed(err())),
        (Error(err()), Idle),
        (Ending, Ended),
        (Ending, Failed(err())),
        (Ended, Idle),
        (Failed(err()), Idle),
    ];

    for (from, to) in &valid {
        assert!(
            from.can_transition_to(to),
            "{} -> {} should be a valid transition",
            from,
            to
        );
    }
}

#[test]
fn test_invalid_transitions() {
    use SessionState::*;

    let invalid = [
        (Idle, Running),
        (Idle, Ready),
        (Idle, Ended),
        (Idle, Error(err())),
        (Configuring, Running),
        (Configuring, Idle),
        (Ready, Paused),
        (Ready, Idle),
        (Running, Idle),
        (Running, Ready),
        (Running, Configuring),
        (Running, Ended),
        (Paused, Configuring),
        (Paused, Idle),
        (Ending, Running),
        (Ending, Idle),
        (Ended, Running),
        (Ended, Configuring),
        (Ended, Ended),
        (Failed(err()), Running),
        (Failed(err()), Configuring),
        (Failed(err()), Error(err())),
    ];

    for (from, to) in &invalid {
        assert!(
            !from.can_transition_to(to),
            "{} -> {} must not be a valid transition",
            from,
            to
        );
    }
}

#[test]
fn test_terminal_states() {
    assert!(SessionState::Ended.is_terminal());
    assert!(SessionState::Failed(err()).is_terminal());

    assert!(!SessionState::Idle.is_terminal());
    assert!(!SessionState::Running.is_terminal());
    assert!(!SessionState::Error(err()).is_terminal());
    assert!(!SessionState::Ending.is_terminal());
}

#[test]
fn test_can_end() {
    assert!(SessionState::Ready.can_end());
    assert!(SessionState::Running.can_end());
    assert!(SessionState::Paused.can_end());
    assert!(SessionState::Error(err()).can_end());

    assert!(!SessionState::Idle.can_end());
    assert!(!SessionState::Configuring.can_end());
    assert!(!SessionState::Ending.can_end());
    assert!(!SessionState::Ended.can_end());
    assert!(!SessionState::Failed(err()).can_end());
}

#[test]
fn test_can_reset() {
    assert!(SessionState::Ended.can_reset());
    assert!(SessionState::Error(err()).can_reset());
    assert!(SessionState::Failed(err()).can_reset());

    assert!(!SessionState::Idle.can_reset());
    assert!(!SessionState::Running.can_reset());
    assert!(!SessionState::Paused.can_reset());
}

#[test]
fn test_state_names() {
    assert_eq!(SessionState::Idle.name(), "idle");
    assert_eq!(SessionState::Error(err()).name(), "error");
    assert_eq!(SessionState::Failed(err()).name(), "failed");
    assert_eq!(format!("{}", SessionState::Running), "running");
}
