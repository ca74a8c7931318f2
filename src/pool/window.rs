//! Compatibility window and pair scoring
//!
//! A participant accepts any partner whose own acceptance window intersects
//! theirs. Among admissible partners the one with the lowest score wins; the
//! score trades rating closeness against how long the candidate has waited.

use crate::types::PoolEntry;
use chrono::{DateTime, Utc};

/// Default half-width of the acceptance window
pub const DEFAULT_TOLERANCE: i64 = 200;

/// Default score bonus per second waited
pub const DEFAULT_WAIT_TIME_WEIGHT: f64 = 0.1;

/// Acceptance range `(rating - tolerance, rating + tolerance)`
pub fn window_for(rating: i64, tolerance: i64) -> (i64, i64) {
    (
        rating.saturating_sub(tolerance),
        rating.saturating_add(tolerance),
    )
}

/// Symmetric interval overlap of the two acceptance windows
pub fn overlap(a: &PoolEntry, b: &PoolEntry) -> bool {
    a.accept_min <= b.accept_max && a.accept_max >= b.accept_min
}

/// `|a.rating - b.rating| - weight * seconds_waited(b)`, lower is better
pub fn pair_score(a: &PoolEntry, b: &PoolEntry, now: DateTime<Utc>, weight: f64) -> f64 {
    let rating_gap = a.rating.abs_diff(b.rating) as f64;
    rating_gap - weight * b.seconds_waited(now)
}

/// Decides which pairs are admissible and how good they are
pub trait PairScorer: Send + Sync + std::fmt::Debug {
    /// Whether `a` and `b` may be paired at all
    fn admissible(&self, a: &PoolEntry, b: &PoolEntry) -> bool {
        overlap(a, b)
    }

    /// Quality of pairing `a` with candidate `b` (lower is better)
    fn score(&self, a: &PoolEntry, b: &PoolEntry, now: DateTime<Utc>) -> f64;
}

/// Rating gap minus a linear wait-time bonus
#[derive(Debug, Clone, Copy)]
pub struct RatingGapScorer {
    wait_time_weight: f64,
}

impl RatingGapScorer {
    pub fn new(wait_time_weight: f64) -> Self {
        Self { wait_time_weight }
    }

    pub fn wait_time_weight(&self) -> f64 {
        self.wait_time_weight
    }
}

impl Default for RatingGapScorer {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIME_WEIGHT)
    }
}

impl PairScorer for RatingGapScorer {
    fn score(&self, a: &PoolEntry, b: &PoolEntry, now: DateTime<Utc>) -> f64 {
        pair_score(a, b, now, self.wait_time_weight)
    }
}
