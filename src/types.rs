//! Common types used throughout the matchmaking engine

use crate::pool::window::window_for;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for participants
pub type ParticipantId = String;

/// Unique identifier for created sessions
pub type SessionId = Uuid;

/// One waiting participant in the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub id: ParticipantId,
    pub display_label: String,
    pub rating: i64,
    pub accept_min: i64,
    pub accept_max: i64,
    pub registered_at: DateTime<Utc>,
    /// When the participant asked to be actively matched
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub active: bool,
    /// Insertion order within the pool
    pub sequence: u64,
}

impl PoolEntry {
    /// Create an inactive entry whose acceptance window is `rating ± tolerance`
    pub fn new(
        id: ParticipantId,
        display_label: String,
        rating: i64,
        tolerance: i64,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let (accept_min, accept_max) = window_for(rating, tolerance);
        Self {
            id,
            display_label,
            rating,
            accept_min,
            accept_max,
            registered_at: now,
            joined_at: now,
            last_activity: now,
            active: false,
            sequence,
        }
    }

    /// Seconds since the participant began matching, never negative
    pub fn seconds_waited(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.joined_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }
}

/// Two participants claimed by one pairing pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub first: PoolEntry,
    pub second: PoolEntry,
    /// Score the pair was chosen with (lower is better)
    pub score: f64,
}

impl MatchedPair {
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        vec![self.first.id.clone(), self.second.id.clone()]
    }

    pub fn rating_gap(&self) -> u64 {
        self.first.rating.abs_diff(self.second.rating)
    }
}

/// Lifecycle state of a persisted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "waiting"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Participant details copied into a session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParticipant {
    pub id: ParticipantId,
    pub display_label: String,
    pub rating: i64,
}

impl From<&PoolEntry> for SessionParticipant {
    fn from(entry: &PoolEntry) -> Self {
        Self {
            id: entry.id.clone(),
            display_label: entry.display_label.clone(),
            rating: entry.rating,
        }
    }
}

/// Record handed to the session store for a matched pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub participants: Vec<SessionParticipant>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Build a waiting session for a pair
    pub fn for_pair(session_id: SessionId, pair: &MatchedPair, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            participants: vec![
                SessionParticipant::from(&pair.first),
                SessionParticipant::from(&pair.second),
            ],
            status: SessionStatus::Waiting,
            created_at: now,
        }
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }
}

/// Event emitted when a session has been created for a pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFound {
    pub session_id: SessionId,
    pub participant_ids: Vec<ParticipantId>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a pair was claimed but its session could not be persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFailed {
    pub session_id: SessionId,
    pub participant_ids: Vec<ParticipantId>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound notification messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchEvent {
    MatchFound(MatchFound),
    MatchFailed(MatchFailed),
}
