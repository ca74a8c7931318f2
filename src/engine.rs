//! Matchmaking engine
//!
//! This module provides the `MatchmakingEngine` that the request layer talks
//! to. It owns the pool store, runs pairing and sweeping passes against it,
//! and hands claimed pairs off to session creation outside the pool lock.

use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::pairing::scheduler::PairingScheduler;
use crate::pool::store::PoolStore;
use crate::pool::window::{PairScorer, RatingGapScorer, DEFAULT_TOLERANCE, DEFAULT_WAIT_TIME_WEIGHT};
use crate::session::handoff::{HandoffOutcome, SessionHandoff, DEFAULT_PERSISTENCE_TIMEOUT};
use crate::session::notifier::MatchNotifier;
use crate::session::storage::SessionStore;
use crate::sweeper::LifecycleSweeper;
use crate::types::{MatchedPair, PoolEntry};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Engine tuning, fixed at startup
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Half-width of each participant's acceptance window
    pub rating_tolerance: i64,
    /// Score bonus per second a candidate has waited
    pub wait_time_weight: f64,
    pub pairing_interval: Duration,
    pub sweep_interval: Duration,
    /// Entries idle longer than this are evicted
    pub idle_timeout: Duration,
    /// Bound on each session persistence call
    pub persistence_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rating_tolerance: DEFAULT_TOLERANCE,
            wait_time_weight: DEFAULT_WAIT_TIME_WEIGHT,
            pairing_interval: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            persistence_timeout: DEFAULT_PERSISTENCE_TIMEOUT,
        }
    }
}

/// Statistics about engine operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub participants_registered: u64,
    pub participants_cancelled: u64,
    pub participants_evicted: u64,
    pub pairing_ticks: u64,
    pub sweep_ticks: u64,
    pub pairs_formed: u64,
    pub sessions_created: u64,
    pub persistence_failures: u64,
    /// Current number of pooled entries
    pub pool_size: usize,
    /// Current number of entries visible to pairing
    pub active_participants: usize,
}

/// Result of one pairing pass
#[derive(Debug)]
pub struct PairingTick {
    /// Pairs claimed and removed from the pool
    pub pairs: Vec<MatchedPair>,
    /// One running handoff per pair, in the same order
    pub handoffs: Vec<JoinHandle<HandoffOutcome>>,
}

impl PairingTick {
    /// Wait for every handoff launched by this pass
    pub async fn join(self) -> Vec<HandoffOutcome> {
        let mut outcomes = Vec::with_capacity(self.handoffs.len());
        for handle in self.handoffs {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Handoff task failed: {}", e),
            }
        }
        outcomes
    }
}

/// The matchmaking engine
#[derive(Clone)]
pub struct MatchmakingEngine {
    /// Pool of waiting participants
    pool: Arc<PoolStore>,
    /// Pair admissibility and scoring
    scorer: Arc<dyn PairScorer>,
    /// Session creation and notification for claimed pairs
    handoff: Arc<SessionHandoff>,
    config: EngineConfig,
    stats: Arc<RwLock<EngineStats>>,
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchmakingEngine {
    /// Create a new engine with its own metrics collector
    pub fn new(
        config: EngineConfig,
        session_store: Arc<dyn SessionStore>,
        notifier: Option<Arc<dyn MatchNotifier>>,
    ) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(config, session_store, notifier, metrics_collector)
    }

    /// Create a new engine reporting into an existing metrics collector
    pub fn with_metrics(
        config: EngineConfig,
        session_store: Arc<dyn SessionStore>,
        notifier: Option<Arc<dyn MatchNotifier>>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let handoff = Arc::new(SessionHandoff::new(
            session_store,
            notifier,
            config.persistence_timeout,
            metrics_collector.clone(),
        ));

        Self {
            pool: Arc::new(PoolStore::new(config.rating_tolerance)),
            scorer: Arc::new(RatingGapScorer::new(config.wait_time_weight)),
            handoff,
            config,
            stats: Arc::new(RwLock::new(EngineStats::default())),
            metrics_collector,
        }
    }

    /// Replace the pair scorer
    pub fn with_scorer(mut self, scorer: Arc<dyn PairScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    fn update_stats(&self, update: impl FnOnce(&mut EngineStats)) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;
        update(&mut stats);
        Ok(())
    }

    fn record_rejection(&self, err: &anyhow::Error) {
        let reason = match MatchmakingError::from_anyhow(err) {
            Some(MatchmakingError::AlreadyPresent { .. }) => "already_present",
            Some(MatchmakingError::NotFound { .. }) => "not_found",
            Some(MatchmakingError::InvalidRequest { .. }) => "invalid",
            _ => return,
        };
        self.metrics_collector.record_rejection(reason);
    }

    /// Add a participant to the pool without starting matching
    pub fn register(&self, id: &str, display_label: &str, rating: i64) -> Result<PoolEntry> {
        if id.trim().is_empty() {
            let err: anyhow::Error = MatchmakingError::InvalidRequest {
                reason: "Participant ID cannot be empty".to_string(),
            }
            .into();
            self.record_rejection(&err);
            return Err(err);
        }

        let entry = self.pool.insert(id, display_label, rating).map_err(|e| {
            self.record_rejection(&e);
            e
        })?;

        self.update_stats(|stats| stats.participants_registered += 1)?;
        self.metrics_collector.record_registration();

        info!(
            "Registered participant '{}' ({}) - rating: {}, window: [{}, {}]",
            entry.id, entry.display_label, entry.rating, entry.accept_min, entry.accept_max
        );
        Ok(entry)
    }

    /// Make a registered participant visible to the pairing scheduler
    pub fn begin_matching(&self, id: &str) -> Result<()> {
        self.begin_matching_at(id, current_timestamp())
    }

    /// `begin_matching` with the wait clock starting at `now`
    pub fn begin_matching_at(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.pool.activate_at(id, now).map_err(|e| {
            self.record_rejection(&e);
            e
        })?;

        self.metrics_collector.record_activation();
        info!("Participant '{}' began matching", id);
        Ok(())
    }

    /// Withdraw a participant; cancelling an unknown id is a no-op
    pub fn cancel(&self, id: &str) -> Result<bool> {
        let removed = self.pool.remove(id)?;

        if removed {
            self.update_stats(|stats| stats.participants_cancelled += 1)?;
            self.metrics_collector.record_cancellation();
            info!("Participant '{}' cancelled matching", id);
        } else {
            debug!("Cancel for '{}' ignored - not in pool", id);
        }
        Ok(removed)
    }

    /// Liveness signal from a participant; unknown ids are ignored
    pub fn heartbeat(&self, id: &str) -> Result<bool> {
        self.heartbeat_at(id, current_timestamp())
    }

    /// `heartbeat` recorded as of `now`
    pub fn heartbeat_at(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let present = self.pool.touch_at(id, now)?;
        if !present {
            debug!("Heartbeat for '{}' ignored - not in pool", id);
        }
        Ok(present)
    }

    /// Active entries, for operational visibility
    pub fn status(&self) -> Result<Vec<PoolEntry>> {
        self.pool.snapshot_active()
    }

    /// Run one pairing pass at the current time
    pub fn run_pairing_pass(&self) -> Result<PairingTick> {
        self.run_pairing_pass_at(current_timestamp())
    }

    /// Run one pairing pass, scoring wait times against `now`
    ///
    /// Claimed pairs are already gone from the pool when this returns; their
    /// handoffs run on independent tasks.
    pub fn run_pairing_pass_at(&self, now: DateTime<Utc>) -> Result<PairingTick> {
        let timer = self.metrics_collector.start_timer();
        let candidates = self.pool.active_len()?;
        let pairs = self.pool.take_pairs(now, self.scorer.as_ref())?;
        self.metrics_collector
            .record_pairing_pass(candidates, pairs.len(), timer.stop());

        let handoffs: Vec<_> = pairs
            .iter()
            .map(|pair| {
                self.metrics_collector.record_pair(
                    pair.rating_gap(),
                    pair.first.seconds_waited(now),
                    pair.second.seconds_waited(now),
                );
                info!(
                    "Paired '{}' ({}) with '{}' ({}) - score: {:.1}",
                    pair.first.id, pair.first.rating, pair.second.id, pair.second.rating, pair.score
                );
                self.spawn_handoff(pair.clone())
            })
            .collect();

        // Pairs are out of the pool by now; a stats failure must not lose them
        if let Err(e) = self.update_stats(|stats| {
            stats.pairing_ticks += 1;
            stats.pairs_formed += pairs.len() as u64;
        }) {
            warn!("Failed to record pairing pass stats: {}", e);
        }

        Ok(PairingTick { pairs, handoffs })
    }

    fn spawn_handoff(&self, pair: MatchedPair) -> JoinHandle<HandoffOutcome> {
        let handoff = self.handoff.clone();
        let stats = self.stats.clone();

        tokio::spawn(async move {
            let outcome = handoff.hand_off(pair).await;
            if let Ok(mut stats) = stats.write() {
                if outcome.is_created() {
                    stats.sessions_created += 1;
                } else {
                    stats.persistence_failures += 1;
                }
            }
            outcome
        })
    }

    /// Run one sweep at the current time
    pub fn run_sweep(&self) -> Result<Vec<PoolEntry>> {
        self.run_sweep_at(current_timestamp())
    }

    /// Evict every entry idle for longer than the idle timeout as of `now`
    pub fn run_sweep_at(&self, now: DateTime<Utc>) -> Result<Vec<PoolEntry>> {
        let evicted = self.pool.evict_idle(now, self.config.idle_timeout)?;

        self.update_stats(|stats| {
            stats.sweep_ticks += 1;
            stats.participants_evicted += evicted.len() as u64;
        })?;
        self.metrics_collector.record_sweep(evicted.len());

        for entry in &evicted {
            debug!(
                "Evicted idle participant '{}' (last activity {})",
                entry.id, entry.last_activity
            );
        }
        Ok(evicted)
    }

    /// Start the pairing scheduler and lifecycle sweeper
    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        vec![
            PairingScheduler::spawn(self.clone(), self.config.pairing_interval),
            LifecycleSweeper::spawn(self.clone(), self.config.sweep_interval),
        ]
    }

    /// Get current engine statistics
    pub fn stats(&self) -> Result<EngineStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone();

        stats.pool_size = self.pool.len()?;
        stats.active_participants = self.pool.active_len()?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::notifier::MockMatchNotifier;
    use crate::session::storage::InMemorySessionStore;
    use chrono::Duration as ChronoDuration;

    fn create_test_engine() -> (MatchmakingEngine, Arc<InMemorySessionStore>, Arc<MockMatchNotifier>) {
        let store = Arc::new(InMemorySessionStore::new());
        let notifier = Arc::new(MockMatchNotifier::new());
        let engine = MatchmakingEngine::new(
            EngineConfig::default(),
            store.clone(),
            Some(notifier.clone()),
        );
        (engine, store, notifier)
    }

    fn error_of(err: &anyhow::Error) -> &MatchmakingError {
        MatchmakingError::from_anyhow(err).expect("matchmaking error")
    }

    #[test]
    fn test_register_and_status() {
        let (engine, _, _) = create_test_engine();

        engine.register("a", "Alice", 1500).unwrap();
        assert!(engine.status().unwrap().is_empty());

        engine.begin_matching("a").unwrap();
        let status = engine.status().unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].display_label, "Alice");
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty_ids() {
        let (engine, _, _) = create_test_engine();
        engine.register("a", "Alice", 1500).unwrap();

        let dup = engine.register("a", "Alice", 1500).unwrap_err();
        assert!(matches!(error_of(&dup), MatchmakingError::AlreadyPresent { .. }));

        let empty = engine.register("  ", "Nobody", 1500).unwrap_err();
        assert!(matches!(error_of(&empty), MatchmakingError::InvalidRequest { .. }));

        let metrics = engine.metrics_collector();
        assert_eq!(
            metrics
                .pool()
                .rejected_total
                .with_label_values(&["already_present"])
                .get(),
            1
        );
    }

    #[test]
    fn test_begin_matching_unknown_participant() {
        let (engine, _, _) = create_test_engine();
        let err = engine.begin_matching("ghost").unwrap_err();
        assert!(matches!(error_of(&err), MatchmakingError::NotFound { .. }));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (engine, _, _) = create_test_engine();
        engine.register("a", "Alice", 1500).unwrap();

        assert!(engine.cancel("a").unwrap());
        assert!(!engine.cancel("a").unwrap());
        assert!(!engine.cancel("never-registered").unwrap());
        assert_eq!(engine.stats().unwrap().participants_cancelled, 1);
    }

    #[test]
    fn test_heartbeat() {
        let (engine, _, _) = create_test_engine();
        engine.register("a", "Alice", 1500).unwrap();

        assert!(engine.heartbeat("a").unwrap());
        assert!(!engine.heartbeat("ghost").unwrap());
    }

    #[tokio::test]
    async fn test_pairing_pass_creates_session() {
        let (engine, store, notifier) = create_test_engine();
        for (id, rating) in [("a", 1500), ("b", 1550)] {
            engine.register(id, id, rating).unwrap();
            engine.begin_matching(id).unwrap();
        }

        let tick = engine.run_pairing_pass().unwrap();
        assert_eq!(tick.pairs.len(), 1);
        assert!(engine.status().unwrap().is_empty());

        let outcomes = tick.join().await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_created());
        assert_eq!(store.session_count(), 1);
        assert_eq!(
            notifier.matched_participants(),
            vec![vec!["a".to_string(), "b".to_string()]]
        );

        let stats = engine.stats().unwrap();
        assert_eq!(stats.pairs_formed, 1);
        assert_eq!(stats.sessions_created, 1);
        assert_eq!(stats.pool_size, 0);
    }

    #[tokio::test]
    async fn test_pairing_pass_ignores_inactive() {
        let (engine, _, _) = create_test_engine();
        engine.register("a", "a", 1500).unwrap();
        engine.register("b", "b", 1500).unwrap();
        engine.begin_matching("a").unwrap();

        let tick = engine.run_pairing_pass().unwrap();
        assert!(tick.pairs.is_empty());
        assert_eq!(engine.stats().unwrap().pool_size, 2);
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let (engine, _, _) = create_test_engine();
        engine.register("a", "a", 1500).unwrap();
        engine.begin_matching("a").unwrap();

        let later = current_timestamp() + ChronoDuration::minutes(6);
        let evicted = engine.run_sweep_at(later).unwrap();

        assert_eq!(evicted.len(), 1);
        assert!(engine.status().unwrap().is_empty());
        let stats = engine.stats().unwrap();
        assert_eq!(stats.participants_evicted, 1);
        assert_eq!(stats.sweep_ticks, 1);
    }

    #[tokio::test]
    async fn test_extreme_ratings_keep_engine_usable() {
        let store = Arc::new(InMemorySessionStore::new());
        let config = EngineConfig {
            rating_tolerance: i64::MAX,
            ..EngineConfig::default()
        };
        let engine = MatchmakingEngine::new(config, store.clone(), None);
        for (id, rating) in [("a", i64::MAX), ("b", -1)] {
            engine.register(id, id, rating).unwrap();
            engine.begin_matching(id).unwrap();
        }

        let tick = engine.run_pairing_pass().unwrap();
        assert_eq!(tick.pairs.len(), 1);
        assert!(tick.join().await[0].is_created());

        engine.register("c", "c", 0).unwrap();
        assert!(engine.status().unwrap().is_empty());
        assert_eq!(engine.stats().unwrap().pool_size, 1);
    }

    #[tokio::test]
    async fn test_poisoned_stats_do_not_drop_claimed_pairs() {
        let (engine, store, notifier) = create_test_engine();
        for id in ["a", "b"] {
            engine.register(id, id, 1500).unwrap();
            engine.begin_matching(id).unwrap();
        }

        let stats = engine.stats.clone();
        let _ = std::thread::spawn(move || {
            let _guard = stats.write().unwrap();
            panic!("poison stats lock");
        })
        .join();
        assert!(engine.stats().is_err());

        let tick = engine.run_pairing_pass().unwrap();
        assert_eq!(tick.pairs.len(), 1);
        assert!(tick.join().await[0].is_created());
        assert_eq!(store.session_count(), 1);
        assert_eq!(notifier.matched_participants().len(), 1);
    }

    #[test]
    fn test_negative_tolerance_keeps_rating_in_window() {
        let config = EngineConfig {
            rating_tolerance: -10,
            ..EngineConfig::default()
        };
        let engine = MatchmakingEngine::new(config, Arc::new(InMemorySessionStore::new()), None);
        let entry = engine.register("a", "a", 1500).unwrap();
        assert!(entry.accept_min <= entry.rating && entry.rating <= entry.accept_max);
    }

    #[derive(Debug)]
    struct NobodyFits;

    impl PairScorer for NobodyFits {
        fn admissible(&self, _: &PoolEntry, _: &PoolEntry) -> bool {
            false
        }

        fn score(&self, _: &PoolEntry, _: &PoolEntry, _: DateTime<Utc>) -> f64 {
            0.0
        }
    }

    #[tokio::test]
    async fn test_custom_scorer() {
        let (engine, _, _) = create_test_engine();
        let engine = engine.with_scorer(Arc::new(NobodyFits));
        for id in ["a", "b"] {
            engine.register(id, id, 1500).unwrap();
            engine.begin_matching(id).unwrap();
        }

        assert!(engine.run_pairing_pass().unwrap().pairs.is_empty());
        assert_eq!(engine.status().unwrap().len(), 2);
    }
}
