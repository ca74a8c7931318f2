//! Recurring pairing worker

use crate::engine::MatchmakingEngine;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Drives `MatchmakingEngine::run_pairing_pass` on a fixed interval
pub struct PairingScheduler;

impl PairingScheduler {
    /// Spawn the scheduler loop; it runs until the task is aborted
    ///
    /// Handoffs launched by a tick are not awaited here, so a slow session
    /// store never delays the next tick.
    pub fn spawn(engine: MatchmakingEngine, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Pairing scheduler started ({}ms interval)",
                interval.as_millis()
            );

            loop {
                ticker.tick().await;

                match engine.run_pairing_pass() {
                    Ok(tick) if tick.pairs.is_empty() => {
                        debug!("Pairing tick completed - no pairs formed");
                    }
                    Ok(tick) => {
                        info!("Pairing tick formed {} pairs", tick.pairs.len());
                    }
                    Err(e) => {
                        error!("Pairing tick failed: {}", e);
                    }
                }
            }
        })
    }
}
