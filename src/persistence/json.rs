use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::records::{SessionRecord, Utterance};
use super::repository::SessionRepository;
use crate::error::SessionError;

/// JSON-file document store, one file per session under a root directory.
///
/// Documents are held in memory and rewritten whole on each mutation via a
/// temp file + rename, so readers never observe a torn write.
pub struct JsonFileRepository {
    root: PathBuf,
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl JsonFileRepository {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SessionError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            SessionError::PersistenceFailed(format!(
                "failed to create store directory {}: {e}",
                root.display()
            ))
        })?;

        info!(root = %root.display(), "session store opened");

        Ok(Self {
            root,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("session-{session_id}.json"))
    }

    fn write_document(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let path = self.session_path(&record.id);
        let tmp = path.with_extension("json.tmp");

        let payload = serde_json::to_vec_pretty(record)
            .map_err(|e| SessionError::PersistenceFailed(format!("serialize session: {e}")))?;

        fs::write(&tmp, payload)
            .map_err(|e| SessionError::PersistenceFailed(format!("write session file: {e}")))?;
        fs::rename(&tmp, &path)
            .map_err(|e| SessionError::PersistenceFailed(format!("rename session file: {e}")))?;

        debug!(path = %path.display(), "session document written");
        Ok(())
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionRecord) -> T,
    ) -> Result<T, SessionError> {
        let mut sessions = self.sessions.lock().expect("store lock poisoned");
        let record = sessions.get_mut(session_id).ok_or_else(|| {
            SessionError::PersistenceFailed(format!("unknown session: {session_id}"))
        })?;
        let out = f(record);
        self.write_document(record)?;
        Ok(out)
    }
}

#[async_trait]
impl SessionRepository for JsonFileRepository {
    async fn create_session(&self, record: SessionRecord) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().expect("store lock poisoned");
        if sessions.contains_key(&record.id) {
            return Err(SessionError::PersistenceFailed(format!(
                "session already exists: {}",
                record.id
            )));
        }
        self.write_document(&record)?;
        sessions.insert(record.id.clone(), record);
        Ok(())
    }

    async fn append_utterance(
        &self,
        session_id: &str,
        utterance: Utterance,
    ) -> Result<(), SessionError> {
        self.with_session(session_id, |record| {
            record.utterances.push(utterance);
        })
    }

    async fn finalize_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        total_duration_seconds: u64,
    ) -> Result<(), SessionError> {
        self.with_session(session_id, |record| {
            record.ended_at = Some(ended_at);
            record.total_duration_seconds = Some(total_duration_seconds);
        })
    }

    async fn save(&self) -> Result<(), SessionError> {
        let sessions = self.sessions.lock().expect("store lock poisoned");
        for record in sessions.values() {
            self.write_document(record)?;
        }
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let sessions = self.sessions.lock().expect("store lock poisoned");
        Ok(sessions.get(session_id).cloned())
    }
}
