//! Pairing Pool - two-party matchmaking by rating window and wait time
//!
//! This crate keeps an in-memory pool of waiting participants, pairs them on
//! a fixed tick by overlapping rating windows while favouring those who have
//! waited longest, and hands each pair off to session creation.

pub mod amqp;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod pairing;
pub mod pool;
pub mod service;
pub mod session;
pub mod sweeper;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use engine::{EngineConfig, EngineStats, MatchmakingEngine, PairingTick};
pub use pool::{PairScorer, RatingGapScorer};
pub use session::{MatchNotifier, SessionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
