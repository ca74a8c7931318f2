//! Session storage interface and implementations
//!
//! Durable session storage lives outside the engine. The handoff only needs a
//! way to create a session record for a matched pair, which this trait
//! captures, along with an in-memory store for tests and standalone runs.

use crate::error::{MatchmakingError, Result};
use crate::types::{SessionId, SessionRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for session persistence operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a newly matched session, returning its id
    async fn create_session(&self, record: SessionRecord) -> Result<SessionId>;

    /// Look up a previously created session
    async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRecord>>;
}

/// In-memory session storage implementation
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }

    /// All stored sessions (for debugging and tests)
    pub fn all_sessions(&self) -> Vec<SessionRecord> {
        self.sessions
            .read()
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, record: SessionRecord) -> Result<SessionId> {
        let mut sessions =
            self.sessions
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire sessions write lock".to_string(),
                })?;

        if sessions.contains_key(&record.session_id) {
            return Err(MatchmakingError::PersistenceFailure {
                session_id: record.session_id.to_string(),
                reason: "session id already exists".to_string(),
            }
            .into());
        }

        let session_id = record.session_id;
        sessions.insert(session_id, record);
        Ok(session_id)
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        let sessions =
            self.sessions
                .read()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire sessions read lock".to_string(),
                })?;

        Ok(sessions.get(&session_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionParticipant, SessionStatus};
    use crate::utils::{current_timestamp, generate_session_id};

    fn record() -> SessionRecord {
        SessionRecord {
            session_id: generate_session_id(),
            participants: vec![
                SessionParticipant {
                    id: "a".to_string(),
                    display_label: "Alice".to_string(),
                    rating: 1500,
                },
                SessionParticipant {
                    id: "b".to_string(),
                    display_label: "Bob".to_string(),
                    rating: 1550,
                },
            ],
            status: SessionStatus::Waiting,
            created_at: current_timestamp(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = InMemorySessionStore::new();
        let record = record();

        let session_id = store.create_session(record.clone()).await.unwrap();
        assert_eq!(session_id, record.session_id);
        assert_eq!(store.session_count(), 1);

        let stored = store.get_session(session_id).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert!(store
            .get_session(generate_session_id())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_session_id_rejected() {
        let store = InMemorySessionStore::new();
        let record = record();

        store.create_session(record.clone()).await.unwrap();
        let err = store.create_session(record).await.unwrap_err();
        assert!(matches!(
            MatchmakingError::from_anyhow(&err),
            Some(MatchmakingError::PersistenceFailure { .. })
        ));
        assert_eq!(store.all_sessions().len(), 1);
    }
}
