//! Error types for the matchmaking engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Participant already in pool: {participant_id}")]
    AlreadyPresent { participant_id: String },

    #[error("Participant not found: {participant_id}")]
    NotFound { participant_id: String },

    #[error("Session persistence failed for {session_id}: {reason}")]
    PersistenceFailure { session_id: String, reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Match notification failed: {reason}")]
    NotificationFailed { reason: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Look up the matchmaking error carried by an `anyhow::Error`, if any
    pub fn from_anyhow(error: &anyhow::Error) -> Option<&MatchmakingError> {
        error.downcast_ref::<MatchmakingError>()
    }
}
