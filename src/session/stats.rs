use serde::{Deserialize, Serialize};

use crate::connection::ConnectionStatistics;
use crate::recovery::DegradedMode;
use crate::transcription::BufferStatistics;

/// Read-only snapshot of a session's counters, computed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatistics {
    /// Name of the current lifecycle state
    pub state: String,

    /// Wall-clock seconds the session has been running
    pub elapsed_seconds: u64,

    /// Number of applied state transitions
    pub transition_count: usize,

    /// Recovery attempts made for the current failure, if any
    pub recovery_attempts: u32,

    /// Active degraded mode, if the session gave up full capability
    pub degraded_mode: Option<DegradedMode>,

    /// Transcript assembly counters
    pub buffer: BufferStatistics,

    /// Connection health counters
    pub connection: ConnectionStatistics,
}
