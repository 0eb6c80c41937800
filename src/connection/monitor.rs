use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use super::quality::{ConnectionQuality, InterfaceKind};

/// Number of recent request outcomes kept for quality derivation.
const SAMPLE_WINDOW: usize = 10;

/// Number of quality changes kept for session statistics.
const HISTORY_SIZE: usize = 60;

/// Latency tier upper edges in milliseconds (inclusive).
const LATENCY_EXCELLENT_MS: f64 = 100.0;
const LATENCY_GOOD_MS: f64 = 250.0;
const LATENCY_FAIR_MS: f64 = 500.0;
const LATENCY_POOR_MS: f64 = 1000.0;

/// Error-rate tier upper edges (inclusive).
const ERROR_RATE_EXCELLENT: f64 = 0.01;
const ERROR_RATE_GOOD: f64 = 0.05;
const ERROR_RATE_FAIR: f64 = 0.10;
const ERROR_RATE_POOR: f64 = 0.25;

/// One recorded quality change, kept in a bounded history ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityChange {
    pub from: ConnectionQuality,
    pub to: ConnectionQuality,
    pub at: DateTime<Utc>,
}

/// Read-only snapshot of the monitor's counters and derived quality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatistics {
    pub current_quality: ConnectionQuality,
    /// Average latency over successful samples in the window, if any.
    pub average_latency_ms: Option<f64>,
    /// Error rate over the current window.
    pub window_error_rate: f64,
    /// Total successes recorded over the monitor's lifetime.
    pub total_successes: u64,
    /// Total errors recorded over the monitor's lifetime.
    pub total_errors: u64,
    /// Number of quality changes seen (bounded by the history ring).
    pub quality_changes: usize,
}

/// One request outcome. `latency_ms` is `None` for errors.
#[derive(Debug, Clone, Copy)]
struct Sample {
    latency_ms: Option<f64>,
}

struct MonitorInner {
    samples: VecDeque<Sample>,
    total_successes: u64,
    total_errors: u64,
    path_available: bool,
    interface: InterfaceKind,
    quality: ConnectionQuality,
    history: VecDeque<QualityChange>,
}

/// Derives a discrete [`ConnectionQuality`] from request latency/error
/// history and network path availability.
///
/// Quality is the worse of the latency tier and the error-rate tier over a
/// sliding window of the last 10 request outcomes. An unavailable network
/// path forces `Disconnected` regardless of measurements. All tier
/// comparisons use inclusive upper edges.
pub struct ConnectionQualityMonitor {
    inner: Mutex<MonitorInner>,
    quality_tx: watch::Sender<ConnectionQuality>,
}

impl ConnectionQualityMonitor {
    /// Create a monitor that optimistically assumes an available path.
    pub fn new() -> Self {
        let initial = ConnectionQuality::Fair;
        let (quality_tx, _) = watch::channel(initial);

        Self {
            inner: Mutex::new(MonitorInner {
                samples: VecDeque::with_capacity(SAMPLE_WINDOW),
                total_successes: 0,
                total_errors: 0,
                path_available: true,
                interface: InterfaceKind::Unknown,
                quality: initial,
                history: VecDeque::with_capacity(HISTORY_SIZE),
            }),
            quality_tx,
        }
    }

    /// Record a successful request and its round-trip latency.
    pub fn record_success(&self, latency_ms: f64) {
        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        inner.total_successes += 1;
        Self::push_sample(
            &mut inner,
            Sample {
                latency_ms: Some(latency_ms),
            },
        );
        self.recompute(&mut inner);
    }

    /// Record a failed request.
    pub fn record_error(&self) {
        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        inner.total_errors += 1;
        Self::push_sample(&mut inner, Sample { latency_ms: None });
        self.recompute(&mut inner);
    }

    /// React to a network path change.
    ///
    /// Becoming available clears the measurement window and promotes the
    /// quality to `Fair` before new measurements arrive. Becoming
    /// unavailable records an immediate disconnection.
    pub fn path_changed(&self, available: bool, interface: InterfaceKind) {
        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        inner.path_available = available;
        inner.interface = interface;

        if available {
            info!(?interface, "network path available");
            inner.samples.clear();
        } else {
            info!("network path unavailable");
        }

        self.recompute(&mut inner);
    }

    /// Current derived quality.
    pub fn quality(&self) -> ConnectionQuality {
        self.inner.lock().expect("monitor lock poisoned").quality
    }

    /// Subscribe to quality changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionQuality> {
        self.quality_tx.subscribe()
    }

    /// Snapshot the monitor's counters and derived quality.
    pub fn statistics(&self) -> ConnectionStatistics {
        let inner = self.inner.lock().expect("monitor lock poisoned");
        ConnectionStatistics {
            current_quality: inner.quality,
            average_latency_ms: Self::average_latency(&inner.samples),
            window_error_rate: Self::error_rate(&inner.samples),
            total_successes: inner.total_successes,
            total_errors: inner.total_errors,
            quality_changes: inner.history.len(),
        }
    }

    /// Clear all measurements and history for a fresh session.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("monitor lock poisoned");
        inner.samples.clear();
        inner.total_successes = 0;
        inner.total_errors = 0;
        inner.history.clear();
        inner.quality = if inner.path_available {
            ConnectionQuality::Fair
        } else {
            ConnectionQuality::Disconnected
        };
        let _ = self.quality_tx.send(inner.quality);
    }

    fn push_sample(inner: &mut MonitorInner, sample: Sample) {
        if inner.samples.len() == SAMPLE_WINDOW {
            inner.samples.pop_front();
        }
        inner.samples.push_back(sample);
    }

    fn recompute(&self, inner: &mut MonitorInner) {
        let derived = if !inner.path_available {
            ConnectionQuality::Disconnected
        } else if inner.samples.is_empty() {
            // No measurements yet on this path: optimistic default.
            ConnectionQuality::Fair
        } else {
            let error_quality = Self::quality_for_error_rate(Self::error_rate(&inner.samples));
            let quality = match Self::average_latency(&inner.samples) {
                Some(avg) => Self::quality_for_latency(avg).min(error_quality),
                None => error_quality,
            };
            // Cellular links degrade without warning: cap the ceiling.
            if inner.interface == InterfaceKind::Cellular {
                quality.min(ConnectionQuality::Good)
            } else {
                quality
            }
        };

        if derived != inner.quality {
            debug!(
                from = inner.quality.label(),
                to = derived.label(),
                "connection quality changed"
            );
            if inner.history.len() == HISTORY_SIZE {
                inner.history.pop_front();
            }
            inner.history.push_back(QualityChange {
                from: inner.quality,
                to: derived,
                at: Utc::now(),
            });
            inner.quality = derived;
            let _ = self.quality_tx.send(derived);
        }
    }

    fn average_latency(samples: &VecDeque<Sample>) -> Option<f64> {
        let latencies: Vec<f64> = samples.iter().filter_map(|s| s.latency_ms).collect();
        if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        }
    }

    fn error_rate(samples: &VecDeque<Sample>) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let errors = samples.iter().filter(|s| s.latency_ms.is_none()).count();
        errors as f64 / samples.len() as f64
    }

    fn quality_for_latency(avg_ms: f64) -> ConnectionQuality {
        if avg_ms <= LATENCY_EXCELLENT_MS {
            ConnectionQuality::Excellent
        } else if avg_ms <= LATENCY_GOOD_MS {
            ConnectionQuality::Good
        } else if avg_ms <= LATENCY_FAIR_MS {
            ConnectionQuality::Fair
        } else if avg_ms <= LATENCY_POOR_MS {
            ConnectionQuality::Poor
        } else {
            ConnectionQuality::Disconnected
        }
    }

    fn quality_for_error_rate(rate: f64) -> ConnectionQuality {
        if rate <= ERROR_RATE_EXCELLENT {
            ConnectionQuality::Excellent
        } else if rate <= ERROR_RATE_GOOD {
            ConnectionQuality::Good
        } else if rate <= ERROR_RATE_FAIR {
            ConnectionQuality::Fair
        } else if rate <= ERROR_RATE_POOR {
            ConnectionQuality::Poor
        } else {
            ConnectionQuality::Disconnected
        }
    }
}

impl Default for ConnectionQualityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
