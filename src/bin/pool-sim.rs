//! Pool Simulator CLI Tool
//!
//! Runs the matchmaking engine in-process against synthetic participants, so
//! tuning changes can be tried without a running service.
//!
//! Usage:
//!   cargo run --bin pool-sim -- --help
//!   cargo run --bin pool-sim simulate --participants 200 --spread 800 --ticks 30
//!   cargo run --bin pool-sim run-scenario --scenario wait-bonus
//!   cargo run --bin pool-sim run-all-scenarios

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use pairing_pool::engine::{EngineConfig, MatchmakingEngine};
use pairing_pool::session::handoff::HandoffOutcome;
use pairing_pool::utils::current_timestamp;
use std::sync::Arc;

#[path = "../../tests/fixtures/mod.rs"]
mod fixtures;

use fixtures::{active_ids, engine_with_store, join_at, FlakySessionStore};

#[derive(Parser)]
#[command(name = "pool-sim")]
#[command(about = "In-process simulation of the pairing-pool matchmaking engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Rating tolerance
    #[arg(long, default_value = "200")]
    tolerance: i64,

    /// Score bonus per second waited
    #[arg(long, default_value = "0.1")]
    weight: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed synthetic arrivals through a series of pairing ticks
    Simulate {
        /// Total participants to register
        #[arg(short, long, default_value = "100")]
        participants: usize,
        /// Width of the rating distribution around 1500
        #[arg(short, long, default_value = "600")]
        spread: i64,
        /// Number of one-second pairing ticks
        #[arg(short, long, default_value = "20")]
        ticks: u32,
    },
    /// Run a predefined scenario
    RunScenario {
        /// Scenario name (within-window, no-overlap, wait-bonus, idle-eviction, persistence-failure)
        #[arg(short, long)]
        scenario: String,
    },
    /// Run all scenarios
    RunAllScenarios,
}

/// Deterministic rating spread; ratings cover `1500 ± spread/2`
fn synthetic_rating(index: usize, spread: i64) -> i64 {
    if spread <= 0 {
        return 1500;
    }
    let offset = ((index as i64).wrapping_mul(7919) % (spread + 1)) - spread / 2;
    1500 + offset
}

struct Simulation {
    engine: MatchmakingEngine,
    store: Arc<FlakySessionStore>,
    start: DateTime<Utc>,
}

impl Simulation {
    fn new(config: EngineConfig, store: FlakySessionStore) -> Self {
        let store = Arc::new(store);
        let (engine, _) = engine_with_store(config, store.clone());
        Self {
            engine,
            store,
            start: current_timestamp(),
        }
    }

    fn at(&self, seconds: i64) -> DateTime<Utc> {
        self.start + ChronoDuration::seconds(seconds)
    }

    fn join(&self, id: &str, rating: i64, second: i64) -> Result<()> {
        join_at(&self.engine, id, rating, self.at(second))
    }

    async fn tick(&self, second: i64) -> Result<Vec<HandoffOutcome>> {
        let tick = self.engine.run_pairing_pass_at(self.at(second))?;
        for pair in &tick.pairs {
            println!(
                "  t={:>3}s  {} ({}) <-> {} ({})  score {:.1}",
                second, pair.first.id, pair.first.rating, pair.second.id, pair.second.rating, pair.score
            );
        }
        Ok(tick.join().await)
    }
}

async fn simulate(config: EngineConfig, participants: usize, spread: i64, ticks: u32) -> Result<()> {
    let sim = Simulation::new(config, FlakySessionStore::new());
    let ticks = ticks.max(1) as usize;
    let per_tick = participants.div_ceil(ticks);

    println!(
        "Simulating {} participants over {} ticks (spread {})",
        participants, ticks, spread
    );

    let mut registered = 0;
    for second in 0..ticks {
        for _ in 0..per_tick {
            if registered == participants {
                break;
            }
            let id = format!("p{:04}", registered);
            sim.join(&id, synthetic_rating(registered, spread), second as i64)?;
            registered += 1;
        }
        sim.tick(second as i64).await?;
    }

    let stats = sim.engine.stats()?;
    let waiting = active_ids(&sim.engine);
    println!();
    println!("Results:");
    println!("  Pairs formed: {}", stats.pairs_formed);
    println!("  Sessions created: {}", stats.sessions_created);
    println!("  Still waiting: {}", waiting.len());
    if !waiting.is_empty() {
        println!("  Unmatched: {:?}", waiting);
    }
    Ok(())
}

/// Returns whether the scenario behaved as expected
async fn run_scenario(config: EngineConfig, name: &str) -> Result<bool> {
    match name {
        "within-window" => {
            let sim = Simulation::new(config, FlakySessionStore::new());
            sim.join("A", 1500, 0)?;
            sim.join("B", 1550, 0)?;
            let outcomes = sim.tick(1).await?;
            Ok(outcomes.len() == 1 && active_ids(&sim.engine).is_empty())
        }
        "no-overlap" => {
            let sim = Simulation::new(config, FlakySessionStore::new());
            sim.join("A", 1000, 0)?;
            sim.join("B", 1500, 0)?;
            let before = sim.tick(1).await?;
            sim.join("C", 1250, 2)?;
            let after = sim.tick(3).await?;
            Ok(before.is_empty() && after.len() == 1 && active_ids(&sim.engine) == ["B"])
        }
        "wait-bonus" => {
            let sim = Simulation::new(config, FlakySessionStore::new());
            sim.join("A", 1500, 0)?;
            sim.join("B", 1530, 0)?;
            sim.join("C", 1515, 200)?;
            let outcomes = sim.tick(200).await?;
            Ok(outcomes.len() == 1 && outcomes[0].participant_ids() == ["A", "B"])
        }
        "idle-eviction" => {
            let sim = Simulation::new(config.clone(), FlakySessionStore::new());
            sim.join("A", 1500, 0)?;
            let idle = config.idle_timeout.as_secs() as i64;
            let evicted = sim.engine.run_sweep_at(sim.at(idle + 1))?;
            println!("  evicted {:?}", evicted.iter().map(|e| &e.id).collect::<Vec<_>>());
            Ok(evicted.len() == 1 && active_ids(&sim.engine).is_empty())
        }
        "persistence-failure" => {
            let sim = Simulation::new(config, FlakySessionStore::new().block("X"));
            sim.join("W", 1000, 0)?;
            sim.join("X", 1000, 0)?;
            sim.join("A", 2000, 0)?;
            sim.join("B", 2000, 0)?;
            let outcomes = sim.tick(1).await?;
            let failed = outcomes.iter().filter(|o| !o.is_created()).count();
            Ok(outcomes.len() == 2 && failed == 1 && sim.store.stored().len() == 1)
        }
        other => Err(anyhow::anyhow!(
            "Unknown scenario '{}'. Available: {}",
            other,
            SCENARIOS.join(", ")
        )),
    }
}

const SCENARIOS: [&str; 5] = [
    "within-window",
    "no-overlap",
    "wait-bonus",
    "idle-eviction",
    "persistence-failure",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig {
        rating_tolerance: cli.tolerance,
        wait_time_weight: cli.weight,
        ..EngineConfig::default()
    };

    match cli.command {
        Commands::Simulate {
            participants,
            spread,
            ticks,
        } => simulate(config, participants, spread, ticks).await?,

        Commands::RunScenario { scenario } => {
            println!("Running scenario: {}", scenario);
            if run_scenario(config, &scenario).await? {
                println!("Scenario completed successfully");
            } else {
                println!("Scenario did not behave as expected");
                std::process::exit(1);
            }
        }

        Commands::RunAllScenarios => {
            let mut failed = 0;
            for name in SCENARIOS {
                println!("Running '{}'...", name);
                match run_scenario(config.clone(), name).await {
                    Ok(true) => println!("  PASSED"),
                    Ok(false) => {
                        println!("  FAILED");
                        failed += 1;
                    }
                    Err(e) => {
                        println!("  FAILED ({})", e);
                        failed += 1;
                    }
                }
            }

            println!(
                "\nResults: {} passed, {} failed",
                SCENARIOS.len() - failed,
                failed
            );
            if failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
