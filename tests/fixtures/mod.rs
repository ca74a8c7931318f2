//! Test fixtures and session store doubles for integration testing
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pairing_pool::engine::{EngineConfig, MatchmakingEngine};
use pairing_pool::error::Result;
use pairing_pool::session::notifier::{MatchNotifier, MockMatchNotifier};
use pairing_pool::session::storage::{InMemorySessionStore, SessionStore};
use pairing_pool::types::{ParticipantId, SessionId, SessionRecord};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Session store that refuses any session involving a blocked participant
#[derive(Default)]
pub struct FlakySessionStore {
    blocked: HashSet<ParticipantId>,
    inner: InMemorySessionStore,
}

impl FlakySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every session that includes `participant_id`
    pub fn block(mut self, participant_id: &str) -> Self {
        self.blocked.insert(participant_id.to_string());
        self
    }

    /// Sessions that were stored successfully
    pub fn stored(&self) -> Vec<SessionRecord> {
        self.inner.all_sessions()
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn create_session(&self, record: SessionRecord) -> Result<SessionId> {
        if let Some(blocked) = record
            .participants
            .iter()
            .find(|p| self.blocked.contains(&p.id))
        {
            return Err(anyhow::anyhow!(
                "session store rejected participant {}",
                blocked.id
            ));
        }
        self.inner.create_session(record).await
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        self.inner.get_session(session_id).await
    }
}

/// Session store that takes `delay` before storing each session
pub struct SlowSessionStore {
    delay: Duration,
    inner: InMemorySessionStore,
}

impl SlowSessionStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: InMemorySessionStore::new(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.session_count()
    }
}

#[async_trait]
impl SessionStore for SlowSessionStore {
    async fn create_session(&self, record: SessionRecord) -> Result<SessionId> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_session(record).await
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        self.inner.get_session(session_id).await
    }
}

/// Engine over `store` with a recording notifier
pub fn engine_with_store(
    config: EngineConfig,
    store: Arc<dyn SessionStore>,
) -> (MatchmakingEngine, Arc<MockMatchNotifier>) {
    let notifier = Arc::new(MockMatchNotifier::new());
    let as_notifier: Arc<dyn MatchNotifier> = notifier.clone();
    let engine = MatchmakingEngine::new(config, store, Some(as_notifier));
    (engine, notifier)
}

/// Engine with default tuning, an in-memory store and a recording notifier
pub fn default_engine() -> (
    MatchmakingEngine,
    Arc<InMemorySessionStore>,
    Arc<MockMatchNotifier>,
) {
    let store = Arc::new(InMemorySessionStore::new());
    let (engine, notifier) = engine_with_store(EngineConfig::default(), store.clone());
    (engine, store, notifier)
}

/// Register and activate a participant, labelled with its own id
pub fn join(engine: &MatchmakingEngine, id: &str, rating: i64) -> Result<()> {
    engine.register(id, id, rating)?;
    engine.begin_matching(id)
}

/// `join` with the wait clock starting at `when`
pub fn join_at(engine: &MatchmakingEngine, id: &str, rating: i64, when: DateTime<Utc>) -> Result<()> {
    engine.register(id, id, rating)?;
    engine.begin_matching_at(id, when)
}

/// Participant ids of every active entry, in pairing order
pub fn active_ids(engine: &MatchmakingEngine) -> Vec<String> {
    engine
        .status()
        .map(|entries| entries.into_iter().map(|e| e.id).collect())
        .unwrap_or_default()
}
