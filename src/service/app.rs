//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the matchmaking
//! engine to its session store, notifier and background tasks.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::publisher::{AmqpMatchNotifier, PublisherConfig};
use crate::config::AppConfig;
use crate::engine::MatchmakingEngine;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::service::health::HealthCheck;
use crate::session::notifier::MatchNotifier;
use crate::session::storage::InMemorySessionStore;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking engine
    engine: MatchmakingEngine,

    /// Where created sessions are kept
    session_store: Arc<InMemorySessionStore>,

    /// Broker connection backing the match notifier, when enabled
    amqp_connection: Option<Arc<AmqpConnection>>,

    metrics_collector: Arc<MetricsCollector>,

    /// Running health server, set by `start`
    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing pairing-pool matchmaking service");
        info!(
            "Configuration: service={}, tolerance={}, weight={}",
            config.service.name,
            config.matchmaking.rating_tolerance,
            config.matchmaking.wait_time_weight
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let (amqp_connection, notifier) = Self::initialize_notifier(&config).await?;

        let session_store = Arc::new(InMemorySessionStore::new());
        let engine = MatchmakingEngine::with_metrics(
            config.engine_config(),
            session_store.clone(),
            notifier,
            metrics_collector.clone(),
        );

        Ok(Self {
            config,
            engine,
            session_store,
            amqp_connection,
            metrics_collector,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the health server, engine workers and maintenance tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting pairing-pool matchmaking service");

        *self.is_running.write().await = true;

        self.start_health_server().await?;
        self.start_engine_workers().await;
        self.start_background_tasks().await;

        info!("Pairing-pool matchmaking service started");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of pairing-pool service");

        *self.is_running.write().await = false;

        self.stop_background_tasks().await;

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        let final_stats =
            self.engine
                .stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final engine statistics: {:?}", final_stats);
        info!(
            "Sessions held in memory at shutdown: {}",
            self.session_store.session_count()
        );
        info!("Pairing-pool service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the matchmaking engine
    pub fn engine(&self) -> &MatchmakingEngine {
        &self.engine
    }

    pub fn session_store(&self) -> Arc<InMemorySessionStore> {
        self.session_store.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Broker connection state, or `None` when the notifier is disabled
    pub fn notifier_connected(&self) -> Option<bool> {
        self.amqp_connection.as_ref().map(|c| c.is_open())
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Connect the AMQP match notifier if it is enabled
    async fn initialize_notifier(
        config: &AppConfig,
    ) -> Result<(Option<Arc<AmqpConnection>>, Option<Arc<dyn MatchNotifier>>), ServiceError> {
        if !config.notifier.enabled {
            info!("AMQP notifier disabled - match events are only logged");
            return Ok((None, None));
        }

        info!("Connecting to AMQP broker: {}", config.notifier.url);

        let amqp_config =
            AmqpConfig::from_url(&config.notifier.url).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to parse AMQP URL: {}", e),
            })?;

        let connection = AmqpConnection::new(amqp_config).await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP: {}", e),
            }
        })?;

        let channel = connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open AMQP channel: {}", e),
            })?;

        let publisher_config = PublisherConfig {
            exchange_name: config.notifier.exchange_name.clone(),
            max_retries: config.notifier.max_retry_attempts,
            retry_delay_ms: config.notifier.retry_delay_ms,
        };
        let notifier = AmqpMatchNotifier::new(channel, publisher_config)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize match notifier: {}", e),
            })?;

        let notifier: Arc<dyn MatchNotifier> = Arc::new(notifier);
        Ok((Some(Arc::new(connection)), Some(notifier)))
    }

    async fn start_health_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.http_port;
        info!("Starting health and metrics endpoints on port {}", port);

        let server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port,
                    host: "0.0.0.0".to_string(),
                },
                self.metrics_collector.clone(),
            )
            .with_app_state(self),
        );

        let handle = {
            let server = server.clone();
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("Health server failed: {}", e);
                }
            })
        };

        *self.health_server.lock().await = Some(server);
        self.background_tasks.lock().await.push(handle);
        Ok(())
    }

    async fn start_engine_workers(&self) {
        let engine_config = self.engine.config();
        info!(
            "Starting pairing scheduler ({}ms) and lifecycle sweeper ({}s, idle timeout {}s)",
            engine_config.pairing_interval.as_millis(),
            engine_config.sweep_interval.as_secs(),
            engine_config.idle_timeout.as_secs()
        );

        let workers = self.engine.spawn_workers();
        self.background_tasks.lock().await.extend(workers);
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        // Pool gauges follow the engine statistics
        let metrics_task = {
            let engine = self.engine.clone();
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(10));

                while *is_running.read().await {
                    interval.tick().await;

                    match engine.stats() {
                        Ok(stats) => {
                            debug!(
                                "Updating metrics - pool: {}, active: {}, sessions: {}",
                                stats.pool_size, stats.active_participants, stats.sessions_created
                            );
                            metrics_collector.update_from_engine_stats(&stats);
                        }
                        Err(e) => {
                            warn!("Failed to get engine stats for metrics update: {}", e);
                        }
                    }
                }

                info!("Metrics update task stopped");
            })
        };

        let health_metrics_task = {
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;
            let notifier_enabled = self.amqp_connection.is_some();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));

                while *is_running.read().await {
                    interval.tick().await;

                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(started_at.elapsed().as_secs() as i64);
                    metrics_collector.update_component_health("matchmaking_engine", true);
                    metrics_collector.update_component_health("amqp_notifier", notifier_enabled);
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(metrics_task);
        tasks.push(health_metrics_task);
        info!("{} background tasks running", tasks.len());
    }

    /// Refresh the health status gauge from a full health check
    pub async fn refresh_health_status(self: &Arc<Self>) {
        match HealthCheck::check(self.clone()).await {
            Ok(health) => self
                .metrics_collector
                .update_health_status(health.status.as_gauge()),
            Err(e) => warn!("Health check failed: {}", e),
        }
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }
        info!("All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        // Let the OS pick a free port
        config.service.http_port = 0;
        config.matchmaking.pairing_interval_ms = 50;
        config
    }

    #[tokio::test]
    async fn test_new_without_notifier() {
        let app_state = AppState::new(test_config()).await.unwrap();

        assert!(!app_state.is_running().await);
        assert_eq!(app_state.notifier_connected(), None);
        assert_eq!(app_state.engine().config().rating_tolerance, 200);
    }

    #[tokio::test]
    async fn test_bad_amqp_url_is_a_configuration_error() {
        let mut config = test_config();
        config.notifier.enabled = true;
        config.notifier.url = "rabbit://nowhere".to_string();

        let err = AppState::new(config).await.err().unwrap();
        assert!(matches!(err, ServiceError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_start_pairs_and_shutdown() {
        let app_state = Arc::new(AppState::new(test_config()).await.unwrap());
        app_state.start().await.unwrap();
        assert!(app_state.is_running().await);

        let engine = app_state.engine();
        for (id, rating) in [("a", 1500), ("b", 1520)] {
            engine.register(id, id, rating).unwrap();
            engine.begin_matching(id).unwrap();
        }

        let mut paired = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if app_state.session_store().session_count() == 1 {
                paired = true;
                break;
            }
        }
        assert!(paired, "scheduler never paired the participants");

        app_state.refresh_health_status().await;
        assert_eq!(app_state.metrics_collector().service().health_status.get(), 2);

        app_state.shutdown().await.unwrap();
        assert!(!app_state.is_running().await);
    }
}
