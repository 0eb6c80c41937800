//! Connection health tracking
//!
//! This module derives a discrete connection quality level from request
//! latency/error history and network path changes. The session manager
//! watches the derived quality and degrades the session when the realtime
//! link becomes unusable.

mod monitor;
mod quality;

pub use monitor::{ConnectionQualityMonitor, ConnectionStatistics, QualityChange};
pub use quality::{ConnectionQuality, InterfaceKind};
