//! Concurrency tests for the shared pool
//!
//! Registration, cancel and heartbeat calls race pairing passes and sweeps on
//! a multi-threaded runtime. Every participant must leave the pool at most
//! once, and none may silently disappear.

mod fixtures;

use fixtures::{default_engine, join};
use futures::future::join_all;
use pairing_pool::engine::MatchmakingEngine;
use std::collections::HashSet;
use std::time::Duration;

const WORKERS: usize = 8;
const PER_WORKER: usize = 40;

/// Run pairing passes until `stop` reports true, returning every claimed pair
async fn pair_until_done(
    engine: MatchmakingEngine,
    stop: tokio::sync::watch::Receiver<bool>,
) -> Vec<Vec<String>> {
    let mut claimed = Vec::new();
    loop {
        let done = *stop.borrow();
        let tick = engine.run_pairing_pass().unwrap();
        claimed.extend(tick.pairs.iter().map(|p| p.participant_ids()));
        tick.join().await;

        if done {
            return claimed;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_double_match_and_no_lost_participant() {
    let (engine, store, notifier) = default_engine();
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    // Two pairing loops race each other as well as the callers
    let pairing_tasks: Vec<_> = (0..2)
        .map(|_| tokio::spawn(pair_until_done(engine.clone(), stop_rx.clone())))
        .collect();

    let callers = (0..WORKERS).map(|w| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut cancelled = Vec::new();
            for i in 0..PER_WORKER {
                let id = format!("w{}-{}", w, i);
                join(&engine, &id, 1500 + (i as i64 % 7) * 10).unwrap();
                engine.heartbeat(&id).unwrap();

                if i % 5 == 0 && engine.cancel(&id).unwrap() {
                    cancelled.push(id);
                }
                tokio::task::yield_now().await;
            }
            cancelled
        })
    });

    let cancelled: HashSet<String> = join_all(callers)
        .await
        .into_iter()
        .flat_map(|r| r.unwrap())
        .collect();

    stop_tx.send(true).unwrap();
    let claimed: Vec<Vec<String>> = join_all(pairing_tasks)
        .await
        .into_iter()
        .flat_map(|r| r.unwrap())
        .collect();

    // No participant in two pairs
    let mut paired = HashSet::new();
    for pair in &claimed {
        assert_eq!(pair.len(), 2);
        for id in pair {
            assert!(paired.insert(id.clone()), "{} paired twice", id);
        }
    }

    // A successful cancel means the participant was never claimed
    assert!(paired.is_disjoint(&cancelled));

    // Everyone is accounted for
    let remaining: HashSet<String> = engine
        .status()
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert!(remaining.len() <= 1, "pool should be drained: {:?}", remaining);

    let total = WORKERS * PER_WORKER;
    assert_eq!(paired.len() + cancelled.len() + remaining.len(), total);

    assert_eq!(store.session_count(), claimed.len());
    assert_eq!(notifier.matched_participants().len(), claimed.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_and_pairing_never_both_claim() {
    let (engine, _, _) = default_engine();
    let ids: Vec<String> = (0..100).map(|i| format!("p{}", i)).collect();
    for id in &ids {
        join(&engine, id, 1500).unwrap();
    }

    // Everything is idle as far as this sweep is concerned
    let far_future = pairing_pool::utils::current_timestamp() + chrono::Duration::hours(1);

    let sweeper = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_sweep_at(far_future).unwrap() })
    };
    let pairer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let tick = engine.run_pairing_pass().unwrap();
            let pairs: Vec<_> = tick.pairs.iter().map(|p| p.participant_ids()).collect();
            tick.join().await;
            pairs
        })
    };

    let evicted: HashSet<String> = sweeper.await.unwrap().into_iter().map(|e| e.id).collect();
    let paired: HashSet<String> = pairer.await.unwrap().into_iter().flatten().collect();

    assert!(evicted.is_disjoint(&paired));
    assert_eq!(evicted.len() + paired.len(), ids.len());
    assert!(engine.status().unwrap().is_empty());
}
