//! Performance benchmarks for pairing passes

use chrono::Duration as ChronoDuration;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pairing_pool::engine::{EngineConfig, MatchmakingEngine};
use pairing_pool::pairing::compute_pairs;
use pairing_pool::pool::RatingGapScorer;
use pairing_pool::session::InMemorySessionStore;
use pairing_pool::types::PoolEntry;
use pairing_pool::utils::current_timestamp;
use std::sync::Arc;

const POOL_SIZES: [usize; 4] = [10, 100, 500, 2000];

fn bench_pool(n: usize) -> Vec<PoolEntry> {
    let now = current_timestamp();
    (0..n)
        .map(|i| {
            let rating = 1000 + ((i as i64 * 7919) % 1000);
            let mut entry = PoolEntry::new(
                format!("player_{}", i),
                format!("Player {}", i),
                rating,
                200,
                i as u64,
                now,
            );
            entry.active = true;
            entry.joined_at = now - ChronoDuration::seconds((i % 120) as i64);
            entry
        })
        .collect()
}

fn bench_compute_pairs(c: &mut Criterion) {
    let scorer = RatingGapScorer::new(0.1);
    let now = current_timestamp();
    let mut group = c.benchmark_group("compute_pairs");

    for n in POOL_SIZES {
        let pool = bench_pool(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &pool, |b, pool| {
            b.iter(|| black_box(compute_pairs(pool, now, &scorer)))
        });
    }
    group.finish();
}

fn bench_pairing_pass(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("pairing_pass");

    for n in POOL_SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                rt.block_on(async {
                    let engine = MatchmakingEngine::new(
                        EngineConfig::default(),
                        Arc::new(InMemorySessionStore::new()),
                        None,
                    );
                    for i in 0..n {
                        let id = format!("player_{}", i);
                        engine
                            .register(&id, &id, 1000 + ((i as i64 * 7919) % 1000))
                            .unwrap();
                        engine.begin_matching(&id).unwrap();
                    }

                    let tick = engine.run_pairing_pass().unwrap();
                    black_box(tick.join().await)
                })
            })
        });
    }
    group.finish();
}

fn bench_heartbeat(c: &mut Criterion) {
    let engine = MatchmakingEngine::new(
        EngineConfig::default(),
        Arc::new(InMemorySessionStore::new()),
        None,
    );
    for i in 0..1000 {
        let id = format!("player_{}", i);
        engine.register(&id, &id, 1500).unwrap();
    }

    c.bench_function("heartbeat", |b| {
        b.iter(|| black_box(engine.heartbeat("player_500").unwrap()))
    });
}

criterion_group!(
    benches,
    bench_compute_pairs,
    bench_pairing_pass,
    bench_heartbeat
);
criterion_main!(benches);
