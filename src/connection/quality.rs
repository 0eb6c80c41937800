use serde::{Deserialize, Serialize};

/// Discrete connection quality level, ordered worst to best.
///
/// The derived ordering is load-bearing: the monitor reports the *minimum*
/// of the latency-based and error-rate-based tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Disconnected,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ConnectionQuality {
    /// Human-readable label for logs and statistics.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionQuality::Disconnected => "disconnected",
            ConnectionQuality::Poor => "poor",
            ConnectionQuality::Fair => "fair",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Excellent => "excellent",
        }
    }
}

/// Kind of network interface the current path runs over.
///
/// Used as a heuristic ceiling: cellular links are capped at `Good` no
/// matter how well they measure, since they degrade without warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Wifi,
    Wired,
    Cellular,
    Unknown,
}
