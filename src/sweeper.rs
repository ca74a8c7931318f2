//! Recurring eviction of idle pool entries
//!
//! Eviction is silent: nobody is notified. Callers notice through `status()`
//! and may register again.

use crate::engine::MatchmakingEngine;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Drives `MatchmakingEngine::run_sweep` on a fixed interval
pub struct LifecycleSweeper;

impl LifecycleSweeper {
    /// Spawn the sweeper loop; it runs until the task is aborted
    pub fn spawn(engine: MatchmakingEngine, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Lifecycle sweeper started ({}s interval)", interval.as_secs());

            loop {
                ticker.tick().await;

                match engine.run_sweep() {
                    Ok(evicted) if evicted.is_empty() => {
                        debug!("Sweep completed - no idle participants");
                    }
                    Ok(evicted) => {
                        info!("Evicted {} idle participants", evicted.len());
                    }
                    Err(e) => {
                        warn!("Sweep failed: {}", e);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::session::storage::InMemorySessionStore;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_ticks_on_interval() {
        let engine = MatchmakingEngine::new(
            EngineConfig::default(),
            Arc::new(InMemorySessionStore::new()),
            None,
        );
        engine.register("a", "a", 1500).unwrap();

        let handle = LifecycleSweeper::spawn(engine.clone(), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(65)).await;
        handle.abort();

        let stats = engine.stats().unwrap();
        assert!(stats.sweep_ticks >= 2);
        // Sweeps run against the wall clock; a fresh entry is never idle here
        assert_eq!(stats.participants_evicted, 0);
        assert_eq!(stats.pool_size, 1);
    }
}
