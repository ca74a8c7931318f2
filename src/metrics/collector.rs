//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the pairing-pool matchmaking
//! engine using Prometheus metrics.

use crate::engine::EngineStats;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking engine
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Pool membership metrics
    pool_metrics: PoolMetrics,

    /// Pairing scheduler and sweeper metrics
    pairing_metrics: PairingMetrics,

    /// Session handoff metrics
    handoff_metrics: HandoffMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Pool membership metrics
#[derive(Clone)]
pub struct PoolMetrics {
    /// Participants registered into the pool
    pub registered_total: IntCounter,

    /// Participants that began active matching
    pub activated_total: IntCounter,

    /// Participants removed by their own cancel
    pub cancelled_total: IntCounter,

    /// Participants evicted for inactivity
    pub evicted_total: IntCounter,

    /// Rejected engine calls by reason
    pub rejected_total: IntCounterVec,

    /// Current pool size by state (active / inactive)
    pub pool_size: IntGaugeVec,
}

/// Pairing scheduler and sweeper metrics
#[derive(Clone)]
pub struct PairingMetrics {
    /// Pairing passes executed
    pub pairing_ticks_total: IntCounter,

    /// Pairs claimed from the pool
    pub pairs_formed_total: IntCounter,

    /// Time spent inside one pairing pass
    pub pass_duration: Histogram,

    /// Active entries considered per pass
    pub pass_candidates: Histogram,

    /// Rating gap of each formed pair
    pub pair_rating_gap: Histogram,

    /// Time each paired participant spent actively waiting
    pub wait_time_seconds: Histogram,

    /// Sweeper passes executed
    pub sweep_ticks_total: IntCounter,
}

/// Session handoff metrics
#[derive(Clone)]
pub struct HandoffMetrics {
    /// Sessions successfully persisted
    pub sessions_created_total: IntCounter,

    /// Session persistence failures (including timeouts)
    pub persistence_failures_total: IntCounter,

    /// Notifier errors swallowed after handoff
    pub notification_failures_total: IntCounter,

    /// End-to-end handoff duration
    pub handoff_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let pool_metrics = PoolMetrics::new(&registry)?;
        let pairing_metrics = PairingMetrics::new(&registry)?;
        let handoff_metrics = HandoffMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            pool_metrics,
            pairing_metrics,
            handoff_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn pool(&self) -> &PoolMetrics {
        &self.pool_metrics
    }

    pub fn pairing(&self) -> &PairingMetrics {
        &self.pairing_metrics
    }

    pub fn handoff(&self) -> &HandoffMetrics {
        &self.handoff_metrics
    }

    /// Refresh gauges from engine statistics
    pub fn update_from_engine_stats(&self, stats: &EngineStats) {
        let inactive = stats.pool_size.saturating_sub(stats.active_participants);

        self.pool_metrics
            .pool_size
            .with_label_values(&["active"])
            .set(stats.active_participants as i64);
        self.pool_metrics
            .pool_size
            .with_label_values(&["inactive"])
            .set(inactive as i64);
    }

    pub fn record_registration(&self) {
        self.pool_metrics.registered_total.inc();
    }

    pub fn record_activation(&self) {
        self.pool_metrics.activated_total.inc();
    }

    pub fn record_cancellation(&self) {
        self.pool_metrics.cancelled_total.inc();
    }

    /// Record a rejected engine call (`already_present`, `not_found`, `invalid`)
    pub fn record_rejection(&self, reason: &str) {
        self.pool_metrics
            .rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record one pairing pass
    pub fn record_pairing_pass(&self, candidates: usize, pairs: usize, duration: Duration) {
        self.pairing_metrics.pairing_ticks_total.inc();
        self.pairing_metrics.pairs_formed_total.inc_by(pairs as u64);
        self.pairing_metrics
            .pass_candidates
            .observe(candidates as f64);
        self.pairing_metrics
            .pass_duration
            .observe(duration.as_secs_f64());
    }

    /// Record the quality of one formed pair
    pub fn record_pair(&self, rating_gap: u64, first_wait_seconds: f64, second_wait_seconds: f64) {
        self.pairing_metrics
            .pair_rating_gap
            .observe(rating_gap as f64);
        self.pairing_metrics
            .wait_time_seconds
            .observe(first_wait_seconds);
        self.pairing_metrics
            .wait_time_seconds
            .observe(second_wait_seconds);
    }

    /// Record one sweeper pass and how many entries it evicted
    pub fn record_sweep(&self, evicted: usize) {
        self.pairing_metrics.sweep_ticks_total.inc();
        self.pool_metrics.evicted_total.inc_by(evicted as u64);
    }

    pub fn record_session_created(&self, duration: Duration) {
        self.handoff_metrics.sessions_created_total.inc();
        self.handoff_metrics
            .handoff_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_persistence_failure(&self, duration: Duration) {
        self.handoff_metrics.persistence_failures_total.inc();
        self.handoff_metrics
            .handoff_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_notification_failure(&self) {
        self.handoff_metrics.notification_failures_total.inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("pairing_pool_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "pairing_pool_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pairing_pool_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl PoolMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let registered_total = IntCounter::new(
            "pairing_pool_participants_registered_total",
            "Participants registered into the pool",
        )?;
        registry.register(Box::new(registered_total.clone()))?;

        let activated_total = IntCounter::new(
            "pairing_pool_participants_activated_total",
            "Participants that began active matching",
        )?;
        registry.register(Box::new(activated_total.clone()))?;

        let cancelled_total = IntCounter::new(
            "pairing_pool_participants_cancelled_total",
            "Participants removed by cancel",
        )?;
        registry.register(Box::new(cancelled_total.clone()))?;

        let evicted_total = IntCounter::new(
            "pairing_pool_participants_evicted_total",
            "Participants evicted for inactivity",
        )?;
        registry.register(Box::new(evicted_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new(
                "pairing_pool_rejected_requests_total",
                "Rejected engine calls by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let pool_size = IntGaugeVec::new(
            Opts::new("pairing_pool_pool_size", "Participants currently pooled"),
            &["state"],
        )?;
        registry.register(Box::new(pool_size.clone()))?;

        Ok(Self {
            registered_total,
            activated_total,
            cancelled_total,
            evicted_total,
            rejected_total,
            pool_size,
        })
    }
}

impl PairingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let pairing_ticks_total = IntCounter::new(
            "pairing_pool_pairing_ticks_total",
            "Pairing passes executed",
        )?;
        registry.register(Box::new(pairing_ticks_total.clone()))?;

        let pairs_formed_total =
            IntCounter::new("pairing_pool_pairs_formed_total", "Pairs claimed from the pool")?;
        registry.register(Box::new(pairs_formed_total.clone()))?;

        let pass_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pairing_pool_pass_duration_seconds",
                "Time spent inside one pairing pass",
            )
            .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(pass_duration.clone()))?;

        let pass_candidates = Histogram::with_opts(
            HistogramOpts::new(
                "pairing_pool_pass_candidates",
                "Active entries considered per pairing pass",
            )
            .buckets(vec![0.0, 1.0, 2.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0]),
        )?;
        registry.register(Box::new(pass_candidates.clone()))?;

        let pair_rating_gap = Histogram::with_opts(
            HistogramOpts::new(
                "pairing_pool_pair_rating_gap",
                "Rating gap of each formed pair",
            )
            .buckets(vec![0.0, 25.0, 50.0, 100.0, 200.0, 300.0, 400.0, 800.0]),
        )?;
        registry.register(Box::new(pair_rating_gap.clone()))?;

        let wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pairing_pool_wait_time_seconds",
                "Active wait time of paired participants",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        registry.register(Box::new(wait_time_seconds.clone()))?;

        let sweep_ticks_total =
            IntCounter::new("pairing_pool_sweep_ticks_total", "Sweeper passes executed")?;
        registry.register(Box::new(sweep_ticks_total.clone()))?;

        Ok(Self {
            pairing_ticks_total,
            pairs_formed_total,
            pass_duration,
            pass_candidates,
            pair_rating_gap,
            wait_time_seconds,
            sweep_ticks_total,
        })
    }
}

impl HandoffMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_created_total = IntCounter::new(
            "pairing_pool_sessions_created_total",
            "Sessions successfully persisted",
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let persistence_failures_total = IntCounter::new(
            "pairing_pool_persistence_failures_total",
            "Session persistence failures",
        )?;
        registry.register(Box::new(persistence_failures_total.clone()))?;

        let notification_failures_total = IntCounter::new(
            "pairing_pool_notification_failures_total",
            "Match notifier errors",
        )?;
        registry.register(Box::new(notification_failures_total.clone()))?;

        let handoff_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pairing_pool_handoff_duration_seconds",
                "Session handoff duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;
        registry.register(Box::new(handoff_duration.clone()))?;

        Ok(Self {
            sessions_created_total,
            persistence_failures_total,
            notification_failures_total,
            handoff_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
