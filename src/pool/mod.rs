//! Pool of waiting participants
//!
//! This module holds the lock-guarded pool store and the compatibility
//! window used to decide which pooled participants may be paired.

pub mod store;
pub mod window;

// Re-export commonly used types
pub use store::PoolStore;
pub use window::{overlap, pair_score, window_for, PairScorer, RatingGapScorer};
