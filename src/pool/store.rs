//! Concurrency-safe pool of waiting participants
//!
//! Every operation takes the single pool mutex for the duration of an in-memory
//! map operation and nothing else. Pairing and eviction run their whole
//! read-decide-delete sequence inside one lock hold, so an entry leaves the
//! pool exactly once.

use crate::error::{MatchmakingError, Result};
use crate::pairing::greedy::compute_pairs;
use crate::pool::window::PairScorer;
use crate::types::{MatchedPair, ParticipantId, PoolEntry};
use crate::utils::{current_timestamp, to_chrono_duration};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct PoolInner {
    entries: HashMap<ParticipantId, PoolEntry>,
    next_sequence: u64,
}

impl PoolInner {
    /// Active entries in insertion order
    fn active_entries(&self) -> Vec<PoolEntry> {
        let mut active: Vec<PoolEntry> = self
            .entries
            .values()
            .filter(|entry| entry.active)
            .cloned()
            .collect();
        active.sort_by_key(|entry| entry.sequence);
        active
    }
}

/// The shared pool of waiting participants
#[derive(Debug)]
pub struct PoolStore {
    inner: Mutex<PoolInner>,
    tolerance: i64,
}

impl PoolStore {
    /// Create an empty pool whose entries accept `rating ± tolerance`
    ///
    /// A negative tolerance is treated as zero so every window still
    /// contains its own rating.
    pub fn new(tolerance: i64) -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            tolerance: tolerance.max(0),
        }
    }

    pub fn tolerance(&self) -> i64 {
        self.tolerance
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolInner>> {
        self.inner.lock().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire pool lock".to_string(),
            }
            .into()
        })
    }

    /// Add an inactive entry; fails if the id is already pooled
    pub fn insert(&self, id: &str, display_label: &str, rating: i64) -> Result<PoolEntry> {
        let now = current_timestamp();
        let mut inner = self.lock()?;

        if inner.entries.contains_key(id) {
            return Err(MatchmakingError::AlreadyPresent {
                participant_id: id.to_string(),
            }
            .into());
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        let entry = PoolEntry::new(
            id.to_string(),
            display_label.to_string(),
            rating,
            self.tolerance,
            sequence,
            now,
        );
        inner.entries.insert(id.to_string(), entry.clone());
        Ok(entry)
    }

    /// Mark an entry active and restart its join and activity clocks
    pub fn activate(&self, id: &str) -> Result<()> {
        self.activate_at(id, current_timestamp())
    }

    /// `activate` with an explicit clock reading
    pub fn activate_at(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock()?;

        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| MatchmakingError::NotFound {
                participant_id: id.to_string(),
            })?;
        entry.active = true;
        entry.joined_at = now;
        entry.last_activity = now;
        Ok(())
    }

    /// Delete an entry; returns whether one was present
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        Ok(inner.entries.remove(id).is_some())
    }

    /// Refresh an entry's activity clock; returns whether one was present
    pub fn touch(&self, id: &str) -> Result<bool> {
        self.touch_at(id, current_timestamp())
    }

    /// `touch` with an explicit clock reading
    pub fn touch_at(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.lock()?;

        match inner.entries.get_mut(id) {
            Some(entry) => {
                entry.last_activity = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copy of every active entry, in insertion order
    pub fn snapshot_active(&self) -> Result<Vec<PoolEntry>> {
        let inner = self.lock()?;
        Ok(inner.active_entries())
    }

    /// Copy of a single entry, active or not
    pub fn get(&self, id: &str) -> Result<Option<PoolEntry>> {
        let inner = self.lock()?;
        Ok(inner.entries.get(id).cloned())
    }

    /// Snapshot, pair and delete the paired entries under one lock hold
    pub fn take_pairs(&self, now: DateTime<Utc>, scorer: &dyn PairScorer) -> Result<Vec<MatchedPair>> {
        let mut inner = self.lock()?;

        let candidates = inner.active_entries();
        let pairs = compute_pairs(&candidates, now, scorer);

        for pair in &pairs {
            inner.entries.remove(&pair.first.id);
            inner.entries.remove(&pair.second.id);
        }

        debug!(
            "Pairing pass claimed {} pairs from {} active entries",
            pairs.len(),
            candidates.len()
        );
        Ok(pairs)
    }

    /// Evict every entry idle for longer than `idle_timeout`
    pub fn evict_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> Result<Vec<PoolEntry>> {
        let idle_timeout = to_chrono_duration(idle_timeout);
        let mut inner = self.lock()?;

        let stale: Vec<ParticipantId> = inner
            .entries
            .values()
            .filter(|entry| now - entry.last_activity > idle_timeout)
            .map(|entry| entry.id.clone())
            .collect();

        let mut evicted: Vec<PoolEntry> = stale
            .iter()
            .filter_map(|id| inner.entries.remove(id))
            .collect();
        evicted.sort_by_key(|entry| entry.sequence);
        Ok(evicted)
    }

    /// Number of pooled entries, active or not
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of entries visible to pairing
    pub fn active_len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.values().filter(|e| e.active).count())
    }
}
