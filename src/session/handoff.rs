//! Session handoff for matched pairs
//!
//! Runs after the pairing pass has released the pool lock. The pair is already
//! gone from the pool; whatever happens here, the participants are not put
//! back. A failed persistence call is surfaced through the notifier's failure
//! hook so the outer layer can re-register them if it wants to.

use crate::error::MatchmakingError;
use crate::metrics::MetricsCollector;
use crate::session::notifier::MatchNotifier;
use crate::session::storage::SessionStore;
use crate::types::{MatchedPair, ParticipantId, SessionId, SessionRecord};
use crate::utils::{current_timestamp, generate_session_id};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default bound on a single session persistence call
pub const DEFAULT_PERSISTENCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of handing off one pair
#[derive(Debug, Clone, PartialEq)]
pub enum HandoffOutcome {
    /// The session was persisted and listeners were notified
    SessionCreated {
        session_id: SessionId,
        participant_ids: Vec<ParticipantId>,
    },
    /// The session could not be persisted; the pair is dropped
    PersistenceFailed {
        session_id: SessionId,
        participant_ids: Vec<ParticipantId>,
        reason: String,
    },
}

impl HandoffOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, HandoffOutcome::SessionCreated { .. })
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            HandoffOutcome::SessionCreated { session_id, .. }
            | HandoffOutcome::PersistenceFailed { session_id, .. } => *session_id,
        }
    }

    pub fn participant_ids(&self) -> &[ParticipantId] {
        match self {
            HandoffOutcome::SessionCreated {
                participant_ids, ..
            }
            | HandoffOutcome::PersistenceFailed {
                participant_ids, ..
            } => participant_ids,
        }
    }
}

/// Turns matched pairs into persisted sessions plus notifications
pub struct SessionHandoff {
    session_store: Arc<dyn SessionStore>,
    notifier: Option<Arc<dyn MatchNotifier>>,
    persistence_timeout: Duration,
    metrics_collector: Arc<MetricsCollector>,
}

impl SessionHandoff {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        notifier: Option<Arc<dyn MatchNotifier>>,
        persistence_timeout: Duration,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            session_store,
            notifier,
            persistence_timeout,
            metrics_collector,
        }
    }

    /// Persist a session for the pair, then notify listeners
    pub async fn hand_off(&self, pair: MatchedPair) -> HandoffOutcome {
        let timer = self.metrics_collector.start_timer();
        let session_id = generate_session_id();
        let participant_ids = pair.participant_ids();
        let record = SessionRecord::for_pair(session_id, &pair, current_timestamp());

        debug!(
            "Creating session {} for participants {:?}",
            session_id, participant_ids
        );

        match self.persist(record).await {
            Ok(stored_id) => {
                self.metrics_collector.record_session_created(timer.stop());
                info!(
                    "Session {} created for '{}' and '{}'",
                    stored_id, pair.first.id, pair.second.id
                );

                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.on_match(stored_id, &participant_ids).await {
                        self.metrics_collector.record_notification_failure();
                        warn!("Match notification failed for session {}: {}", stored_id, e);
                    }
                }

                HandoffOutcome::SessionCreated {
                    session_id: stored_id,
                    participant_ids,
                }
            }
            Err(e) => {
                self.metrics_collector
                    .record_persistence_failure(timer.stop());
                let reason = e.to_string();
                error!(
                    "Session persistence failed for '{}' and '{}': {}",
                    pair.first.id, pair.second.id, reason
                );

                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier
                        .on_match_failed(session_id, &participant_ids, &reason)
                        .await
                    {
                        self.metrics_collector.record_notification_failure();
                        warn!(
                            "Match-failure notification failed for session {}: {}",
                            session_id, e
                        );
                    }
                }

                HandoffOutcome::PersistenceFailed {
                    session_id,
                    participant_ids,
                    reason,
                }
            }
        }
    }

    /// Store the record, bounded by the persistence timeout
    async fn persist(&self, record: SessionRecord) -> Result<SessionId, MatchmakingError> {
        let session_id = record.session_id;

        match tokio::time::timeout(
            self.persistence_timeout,
            self.session_store.create_session(record),
        )
        .await
        {
            Ok(Ok(stored_id)) => Ok(stored_id),
            Ok(Err(e)) => Err(MatchmakingError::PersistenceFailure {
                session_id: session_id.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(MatchmakingError::PersistenceFailure {
                session_id: session_id.to_string(),
                reason: format!(
                    "timed out after {}ms",
                    self.persistence_timeout.as_millis()
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::notifier::{MockMatchNotifier, RecordedNotification};
    use crate::session::storage::{InMemorySessionStore, MockSessionStore};
    use crate::types::PoolEntry;
    use async_trait::async_trait;

    fn pair(a: &str, b: &str) -> MatchedPair {
        let now = current_timestamp();
        MatchedPair {
            first: PoolEntry::new(a.to_string(), a.to_uppercase(), 1500, 200, 0, now),
            second: PoolEntry::new(b.to_string(), b.to_uppercase(), 1550, 200, 1, now),
            score: 50.0,
        }
    }

    fn handoff(
        store: Arc<dyn SessionStore>,
        notifier: Option<Arc<dyn MatchNotifier>>,
    ) -> (SessionHandoff, Arc<MetricsCollector>) {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        (
            SessionHandoff::new(store, notifier, DEFAULT_PERSISTENCE_TIMEOUT, metrics.clone()),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_successful_handoff_persists_and_notifies() {
        let store = Arc::new(InMemorySessionStore::new());
        let notifier = Arc::new(MockMatchNotifier::new());
        let (handoff, metrics) = handoff(store.clone(), Some(notifier.clone()));

        let outcome = handoff.hand_off(pair("a", "b")).await;

        assert!(outcome.is_created());
        assert_eq!(outcome.participant_ids(), ["a", "b"]);
        let record = store
            .get_session(outcome.session_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.participants[0].display_label, "A");
        assert_eq!(
            notifier.notifications(),
            vec![RecordedNotification::Matched {
                session_id: outcome.session_id(),
                participant_ids: vec!["a".to_string(), "b".to_string()],
            }]
        );
        assert_eq!(metrics.handoff().sessions_created_total.get(), 1);
    }

    #[tokio::test]
    async fn test_handoff_without_notifier() {
        let store = Arc::new(InMemorySessionStore::new());
        let (handoff, _) = handoff(store.clone(), None);

        assert!(handoff.hand_off(pair("a", "b")).await.is_created());
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_skips_on_match() {
        let mut store = MockSessionStore::new();
        store.expect_create_session().times(1).returning(|_| {
            Err(anyhow::anyhow!("connection refused"))
        });
        let notifier = Arc::new(MockMatchNotifier::new());
        let (handoff, metrics) = handoff(Arc::new(store), Some(notifier.clone()));

        let outcome = handoff.hand_off(pair("a", "b")).await;

        match &outcome {
            HandoffOutcome::PersistenceFailed { reason, .. } => {
                assert!(reason.contains("connection refused"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(notifier.matched_participants().is_empty());
        assert_eq!(notifier.failure_count(), 1);
        assert_eq!(metrics.handoff().persistence_failures_total.get(), 1);
    }

    struct SlowStore;

    #[async_trait]
    impl SessionStore for SlowStore {
        async fn create_session(&self, record: SessionRecord) -> crate::error::Result<SessionId> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(record.session_id)
        }

        async fn get_session(&self, _: SessionId) -> crate::error::Result<Option<SessionRecord>> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_timeout_is_a_failure() {
        let notifier = Arc::new(MockMatchNotifier::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let handoff = SessionHandoff::new(
            Arc::new(SlowStore),
            Some(notifier.clone()),
            Duration::from_secs(10),
            metrics,
        );

        let outcome = handoff.hand_off(pair("a", "b")).await;

        assert!(!outcome.is_created());
        assert_eq!(notifier.failure_count(), 1);
    }

    struct RejectingNotifier;

    #[async_trait]
    impl MatchNotifier for RejectingNotifier {
        async fn on_match(&self, _: SessionId, _: &[ParticipantId]) -> crate::error::Result<()> {
            Err(anyhow::anyhow!("socket closed"))
        }
    }

    #[tokio::test]
    async fn test_notifier_error_is_swallowed() {
        let store = Arc::new(InMemorySessionStore::new());
        let (handoff, metrics) = handoff(store.clone(), Some(Arc::new(RejectingNotifier)));

        let outcome = handoff.hand_off(pair("a", "b")).await;

        assert!(outcome.is_created());
        assert_eq!(store.session_count(), 1);
        assert_eq!(metrics.handoff().notification_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_spawned_handoffs_are_independent() {
        let store = Arc::new(InMemorySessionStore::new());
        let (handoff, _) = handoff(store.clone(), None);
        let handoff = Arc::new(handoff);

        let handles: Vec<_> = [pair("a", "b"), pair("c", "d")]
            .into_iter()
            .map(|p| {
                let handoff = handoff.clone();
                tokio::spawn(async move { handoff.hand_off(p).await })
            })
            .collect();
        let outcomes = futures::future::join_all(handles).await;

        assert!(outcomes.iter().all(|o| o.as_ref().unwrap().is_created()));
        assert_eq!(store.session_count(), 2);
    }
}
