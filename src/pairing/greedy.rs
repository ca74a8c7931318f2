//! Greedy batch pairing over a pool snapshot
//!
//! Single left-to-right pass: each still-unmatched entry takes the best-scoring
//! admissible partner among the unmatched entries after it. Earlier entries get
//! first choice. This is not a maximum matching; it is deterministic for a given
//! snapshot order and clock.

use crate::pool::window::PairScorer;
use crate::types::{MatchedPair, PoolEntry};
use chrono::{DateTime, Utc};

/// Compute a conflict-free set of pairs from `candidates`
///
/// No entry appears in more than one returned pair. Ties on score keep the
/// earliest candidate in snapshot order.
pub fn compute_pairs(
    candidates: &[PoolEntry],
    now: DateTime<Utc>,
    scorer: &dyn PairScorer,
) -> Vec<MatchedPair> {
    let mut matched = vec![false; candidates.len()];
    let mut pairs = Vec::new();

    for i in 0..candidates.len() {
        if matched[i] {
            continue;
        }

        let first = &candidates[i];
        let mut best: Option<(usize, f64)> = None;

        for j in (i + 1)..candidates.len() {
            if matched[j] {
                continue;
            }

            let second = &candidates[j];
            if !scorer.admissible(first, second) {
                continue;
            }

            let score = scorer.score(first, second, now);
            match best {
                Some((_, best_score)) if score >= best_score => {}
                _ => best = Some((j, score)),
            }
        }

        if let Some((j, score)) = best {
            matched[i] = true;
            matched[j] = true;
            pairs.push(MatchedPair {
                first: first.clone(),
                second: candidates[j].clone(),
                score,
            });
        }
    }

    pairs
}
