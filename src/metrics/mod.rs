//! Metrics and monitoring for the pairing-pool matchmaking service
//!
//! This module provides Prometheus metrics collection and the HTTP endpoints
//! that expose health, statistics and the current pool.

pub mod collector;
pub mod health;

pub use collector::{
    HandoffMetrics, MetricsCollector, MetricsTimer, PairingMetrics, PoolMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
