// Tests for connection quality derivation: latency tiers, error-rate
// tiers, worse-of-both reporting, path overrides, and the history ring.

use interview_live::connection::{ConnectionQuality, ConnectionQualityMonitor, InterfaceKind};

#[test]
fn test_low_latency_no_errors_is_excellent() {
    let monitor = ConnectionQualityMonitor::new();

    for _ in 0..10 {
        monitor.record_success(50.0);
    }

    assert_eq!(monitor.quality(), ConnectionQuality::Excellent);
}

#[test]
fn test_latency_tier_boundaries_are_inclusive() {
    let cases = [
        (100.0, ConnectionQuality::Excellent),
        (250.0, ConnectionQuality::Good),
        (500.0, ConnectionQuality::Fair),
        (1000.0, ConnectionQuality::Poor),
    ];

    for (latency, expected) in cases {
        let monitor = ConnectionQualityMonitor::new();
        for _ in 0..10 {
            monitor.record_success(latency);
        }
        assert_eq!(
            monitor.quality(),
            expected,
            "avg latency {latency}ms should map to {expected:?}"
        );
    }
}

#[test]
fn test_extreme_latency_is_disconnected_despite_no_errors() {
    let monitor = ConnectionQualityMonitor::new();

    for _ in 0..10 {
        monitor.record_success(1500.0);
    }

    assert_eq!(monitor.quality(), ConnectionQuality::Disconnected);
}

#[test]
fn test_reported_quality_is_worse_of_latency_and_error_rate() {
    let monitor = ConnectionQualityMonitor::new();

    // Nine fast successes and one error: 10% error rate caps at Fair even
    // though the latency tier alone would be Excellent.
    for _ in 0..9 {
        monitor.record_success(40.0);
    }
    monitor.record_error();

    assert_eq!(monitor.quality(), ConnectionQuality::Fair);
}

#[test]
fn test_heavy_error_rate_is_disconnected() {
    let monitor = ConnectionQualityMonitor::new();

    for _ in 0..5 {
        monitor.record_success(40.0);
    }
    for _ in 0..5 {
        monitor.record_error();
    }

    assert_eq!(monitor.quality(), ConnectionQuality::Disconnected);
}

#[test]
fn test_window_slides_past_old_errors() {
    let monitor = ConnectionQualityMonitor::new();

    for _ in 0..5 {
        monitor.record_error();
    }
    // Ten fresh successes push every error out of the window.
    for _ in 0..10 {
        monitor.record_success(50.0);
    }

    assert_eq!(monitor.quality(), ConnectionQuality::Excellent);
}

#[test]
fn test_unavailable_path_forces_disconnected() {
    let monitor = ConnectionQualityMonitor::new();

    for _ in 0..10 {
        monitor.record_success(50.0);
    }
    assert_eq!(monitor.quality(), ConnectionQuality::Excellent);

    monitor.path_changed(false, InterfaceKind::Wifi);
    assert_eq!(monitor.quality(), ConnectionQuality::Disconnected);

    // Measurements recorded while the path is down cannot lift the level.
    monitor.record_success(10.0);
    assert_eq!(monitor.quality(), ConnectionQuality::Disconnected);
}

#[test]
fn test_path_recovery_promotes_to_fair_optimistically() {
    let monitor = ConnectionQualityMonitor::new();

    monitor.path_changed(false, InterfaceKind::Wifi);
    assert_eq!(monitor.quality(), ConnectionQuality::Disconnected);

    monitor.path_changed(true, InterfaceKind::Wifi);
    assert_eq!(monitor.quality(), ConnectionQuality::Fair);
}

#[test]
fn test_cellular_interface_caps_quality_at_good() {
    let monitor = ConnectionQualityMonitor::new();
    monitor.path_changed(true, InterfaceKind::Cellular);

    for _ in 0..10 {
        monitor.record_success(20.0);
    }

    assert_eq!(monitor.quality(), ConnectionQuality::Good);
}

#[test]
fn test_quality_ordering() {
    assert!(ConnectionQuality::Disconnected < ConnectionQuality::Poor);
    assert!(ConnectionQuality::Poor < ConnectionQuality::Fair);
    assert!(ConnectionQuality::Fair < ConnectionQuality::Good);
    assert!(ConnectionQuality::Good < ConnectionQuality::Excellent);
}

#[test]
fn test_statistics_snapshot() {
    let monitor = ConnectionQualityMonitor::new();

    for _ in 0..4 {
        monitor.record_success(100.0);
    }
    monitor.record_error();

    let stats = monitor.statistics();
    assert_eq!(stats.total_successes, 4);
    assert_eq!(stats.total_errors, 1);
    assert_eq!(stats.window_error_rate, 0.2);
    assert_eq!(stats.average_latency_ms, Some(100.0));
    assert_eq!(stats.current_quality, monitor.quality());
    assert!(stats.quality_changes >= 1);
}

#[test]
fn test_reset_returns_to_optimistic_default() {
    let monitor = ConnectionQualityMonitor::new();

    for _ in 0..10 {
        monitor.record_error();
    }
    assert_eq!(monitor.quality(), ConnectionQuality::Disconnected);

    monitor.reset();
    let stats = monitor.statistics();
    assert_eq!(monitor.quality(), ConnectionQuality::Fair);
    assert_eq!(stats.total_successes, 0);
    assert_eq!(stats.total_errors, 0);
    assert_eq!(stats.quality_changes, 0);
}

#[tokio::test]
async fn test_quality_changes_are_published() {
    let monitor = ConnectionQualityMonitor::new();
    let mut rx = monitor.subscribe();

    for _ in 0..10 {
        monitor.record_success(50.0);
    }

    rx.changed().await.expect("monitor dropped");
    assert_eq!(*rx.borrow(), ConnectionQuality::Excellent);
}
