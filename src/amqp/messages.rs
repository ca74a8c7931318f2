//! AMQP message definitions and serialization

use crate::error::{MatchmakingError, Result};
use crate::types::MatchEvent;
use serde_json;

/// Default exchange for match events
pub const MATCH_EVENTS_EXCHANGE: &str = "matchmaking.events";

/// Routing keys for events
pub const MATCH_FOUND_ROUTING_KEY: &str = "match.found";
pub const MATCH_FAILED_ROUTING_KEY: &str = "match.failed";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::InvalidRequest {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

impl MessageEnvelope<MatchEvent> {
    /// Wrap a match event, keyed by the session it belongs to
    ///
    /// The correlation id is derived from the session so a retried publish of
    /// the same outcome carries the same id.
    pub fn for_event(event: MatchEvent) -> Self {
        let (correlation_id, timestamp) = match &event {
            MatchEvent::MatchFound(e) => (format!("{}.found", e.session_id), e.timestamp),
            MatchEvent::MatchFailed(e) => (format!("{}.failed", e.session_id), e.timestamp),
        };

        Self {
            routing_key: routing_key(&event).to_string(),
            payload: event,
            correlation_id,
            timestamp,
        }
    }
}

/// Get routing key for a match event
pub fn routing_key(event: &MatchEvent) -> &'static str {
    match event {
        MatchEvent::MatchFound(_) => MATCH_FOUND_ROUTING_KEY,
        MatchEvent::MatchFailed(_) => MATCH_FAILED_ROUTING_KEY,
    }
}
