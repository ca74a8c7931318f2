//! Match notification sinks
//!
//! Notification is best-effort: the handoff logs and drops any error a
//! notifier returns, because the session already exists by then.

use crate::error::Result;
use crate::types::{ParticipantId, SessionId};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Trait for listeners interested in match outcomes
#[async_trait]
pub trait MatchNotifier: Send + Sync {
    /// A session was created for the given participants
    async fn on_match(&self, session_id: SessionId, participant_ids: &[ParticipantId])
        -> Result<()>;

    /// A pair was claimed but its session could not be persisted
    async fn on_match_failed(
        &self,
        _session_id: SessionId,
        _participant_ids: &[ParticipantId],
        _reason: &str,
    ) -> Result<()> {
        Ok(())
    }
}

/// Fans each notification out to several independent listeners
#[derive(Default)]
pub struct CompositeNotifier {
    listeners: Vec<Arc<dyn MatchNotifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn MatchNotifier>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[async_trait]
impl MatchNotifier for CompositeNotifier {
    async fn on_match(
        &self,
        session_id: SessionId,
        participant_ids: &[ParticipantId],
    ) -> Result<()> {
        // One failing listener must not starve the others
        for (i, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_match(session_id, participant_ids).await {
                warn!(
                    "Match listener {} failed for session {}: {}",
                    i, session_id, e
                );
            }
        }
        Ok(())
    }

    async fn on_match_failed(
        &self,
        session_id: SessionId,
        participant_ids: &[ParticipantId],
        reason: &str,
    ) -> Result<()> {
        for (i, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener
                .on_match_failed(session_id, participant_ids, reason)
                .await
            {
                warn!(
                    "Match-failure listener {} failed for session {}: {}",
                    i, session_id, e
                );
            }
        }
        Ok(())
    }
}

/// Notification captured by [`MockMatchNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedNotification {
    Matched {
        session_id: SessionId,
        participant_ids: Vec<ParticipantId>,
    },
    Failed {
        session_id: SessionId,
        participant_ids: Vec<ParticipantId>,
        reason: String,
    },
}

/// Mock notifier for testing
#[derive(Debug, Default)]
pub struct MockMatchNotifier {
    notifications: Mutex<Vec<RecordedNotification>>,
}

impl MockMatchNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded notifications (for testing)
    pub fn notifications(&self) -> Vec<RecordedNotification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// Participant id lists of every successful match, in arrival order
    pub fn matched_participants(&self) -> Vec<Vec<ParticipantId>> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                RecordedNotification::Matched {
                    participant_ids, ..
                } => Some(participant_ids),
                RecordedNotification::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.notifications()
            .iter()
            .filter(|n| matches!(n, RecordedNotification::Failed { .. }))
            .count()
    }

    /// Clear recorded notifications (for testing)
    pub fn clear(&self) {
        if let Ok(mut n) = self.notifications.lock() {
            n.clear();
        }
    }
}

#[async_trait]
impl MatchNotifier for MockMatchNotifier {
    async fn on_match(
        &self,
        session_id: SessionId,
        participant_ids: &[ParticipantId],
    ) -> Result<()> {
        if let Ok(mut n) = self.notifications.lock() {
            n.push(RecordedNotification::Matched {
                session_id,
                participant_ids: participant_ids.to_vec(),
            });
        }
        Ok(())
    }

    async fn on_match_failed(
        &self,
        session_id: SessionId,
        participant_ids: &[ParticipantId],
        reason: &str,
    ) -> Result<()> {
        if let Ok(mut n) = self.notifications.lock() {
            n.push(RecordedNotification::Failed {
                session_id,
                participant_ids: participant_ids.to_vec(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchmakingError;
    use crate::utils::generate_session_id;

    struct FailingNotifier;

    #[async_trait]
    impl MatchNotifier for FailingNotifier {
        async fn on_match(&self, _: SessionId, _: &[ParticipantId]) -> Result<()> {
            Err(MatchmakingError::NotificationFailed {
                reason: "listener offline".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn test_mock_records_notifications() {
        let notifier = MockMatchNotifier::new();
        let ids = vec!["a".to_string(), "b".to_string()];

        notifier.on_match(generate_session_id(), &ids).await.unwrap();
        notifier
            .on_match_failed(generate_session_id(), &ids, "db down")
            .await
            .unwrap();

        assert_eq!(notifier.matched_participants(), vec![ids]);
        assert_eq!(notifier.failure_count(), 1);

        notifier.clear();
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_default_failure_hook_is_noop() {
        let notifier = FailingNotifier;
        assert!(notifier
            .on_match_failed(generate_session_id(), &[], "ignored")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_composite_isolates_failing_listener() {
        let recorder = Arc::new(MockMatchNotifier::new());
        let composite = CompositeNotifier::new()
            .with_listener(Arc::new(FailingNotifier))
            .with_listener(recorder.clone());
        assert_eq!(composite.len(), 2);

        let ids = vec!["a".to_string(), "b".to_string()];
        composite.on_match(generate_session_id(), &ids).await.unwrap();
        composite
            .on_match_failed(generate_session_id(), &ids, "timeout")
            .await
            .unwrap();

        assert_eq!(recorder.matched_participants().len(), 1);
        assert_eq!(recorder.failure_count(), 1);
    }
}
