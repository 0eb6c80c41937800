use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::strategy::DegradedMode;
use crate::error::SessionError;

/// The single durable recovery record. Last writer wins; only one session
/// can be actively recovering at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub recovering_session_id: String,
    pub error_occurred_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub degraded_mode: Option<DegradedMode>,
}

/// Durable storage for the recovery record: one JSON file, read once at
/// startup, overwritten atomically (temp file + rename) on every change.
pub struct RecoveryStateStore {
    path: PathBuf,
}

impl RecoveryStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the persisted record, if any. A malformed file is treated as
    /// absent rather than failing session startup.
    pub fn load(&self) -> Option<RecoveryRecord> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(record) => {
                debug!(path = %self.path.display(), "loaded recovery record");
                Some(record)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding malformed recovery record");
                None
            }
        }
    }

    /// Overwrite the record atomically.
    pub fn save(&self, record: &RecoveryRecord) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SessionError::PersistenceFailed(format!("create recovery store dir: {e}"))
            })?;
        }

        let payload = serde_json::to_vec_pretty(record)
            .map_err(|e| SessionError::PersistenceFailed(format!("serialize recovery record: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .map_err(|e| SessionError::PersistenceFailed(format!("write recovery record: {e}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| SessionError::PersistenceFailed(format!("rename recovery record: {e}")))?;

        Ok(())
    }

    /// Remove the record after a successful recovery or a reset.
    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::PersistenceFailed(format!(
                "remove recovery record: {e}"
            ))),
        }
    }
}
