//! AMQP match event publisher

use crate::amqp::messages::{MessageEnvelope, MATCH_EVENTS_EXCHANGE};
use crate::error::{MatchmakingError, Result};
use crate::session::notifier::MatchNotifier;
use crate::types::{MatchEvent, MatchFailed, MatchFound, ParticipantId, SessionId};
use crate::utils::current_timestamp;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: MATCH_EVENTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PublisherConfig {
    /// Delay before retry number `attempt` (1-based), doubling up to five seconds
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor).min(5000))
    }
}

/// Publishes match outcomes to a topic exchange
pub struct AmqpMatchNotifier {
    channel: Channel,
    config: PublisherConfig,
}

impl AmqpMatchNotifier {
    /// Create a new publisher and declare its exchange
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self { channel, config };

        publisher.setup_exchange().await?;
        Ok(publisher)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic")
            .durable(true)
            .finish();
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!(
                    "Failed to declare exchange {}: {}",
                    self.config.exchange_name, e
                ),
            }
        })?;

        info!("Declared match events exchange '{}'", self.config.exchange_name);
        Ok(())
    }

    /// Publish an event with retry and backoff
    pub async fn publish(&self, event: MatchEvent) -> Result<()> {
        let envelope = MessageEnvelope::for_event(event);

        let mut attempt = 0;
        loop {
            match self.try_publish(&envelope).await {
                Ok(()) => {
                    debug!(
                        "Published {} to exchange {}",
                        envelope.correlation_id, self.config.exchange_name
                    );
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        error!(
                            "Failed to publish {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(MatchmakingError::NotificationFailed {
                            reason: e.to_string(),
                        }
                        .into());
                    }

                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        "Publish attempt {} failed for {}: {}. Retrying in {:?}",
                        attempt, envelope.correlation_id, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<MatchEvent>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl MatchNotifier for AmqpMatchNotifier {
    async fn on_match(
        &self,
        session_id: SessionId,
        participant_ids: &[ParticipantId],
    ) -> Result<()> {
        self.publish(MatchEvent::MatchFound(MatchFound {
            session_id,
            participant_ids: participant_ids.to_vec(),
            timestamp: current_timestamp(),
        }))
        .await
    }

    async fn on_match_failed(
        &self,
        session_id: SessionId,
        participant_ids: &[ParticipantId],
        reason: &str,
    ) -> Result<()> {
        self.publish(MatchEvent::MatchFailed(MatchFailed {
            session_id,
            participant_ids: participant_ids.to_vec(),
            reason: reason.to_string(),
            timestamp: current_timestamp(),
        }))
        .await
    }
}
