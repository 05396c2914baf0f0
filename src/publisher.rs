//! Outbox publisher: drains the transactional outbox to the broker.
//!
//! Rows are published oldest-first and marked sent only after the
//! broker confirms, so delivery is at-least-once and consumers must be
//! idempotent. A failed row records its error and is retried on every
//! later pass.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::repository::OutboxRepository;

/// Publisher settings.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub broker_url: String,
    /// Queues declared each pass so publishes to the default exchange
    /// have somewhere durable to land before any consumer starts.
    pub queues: Vec<String>,
    pub poll_interval: Duration,
}

impl PublisherConfig {
    /// Build from broker settings, declaring every queue the outbox
    /// publishes into.
    pub fn from_broker(broker: &crate::config::BrokerConfig) -> Self {
        Self {
            broker_url: broker.url.clone(),
            queues: vec![
                broker.submissions_queue.clone(),
                broker.status_queue.clone(),
            ],
            poll_interval: broker.poll_interval(),
        }
    }
}

/// Polls the outbox table and relays unsent rows to the broker.
pub struct OutboxPublisher {
    outbox: OutboxRepository,
    config: PublisherConfig,
}

impl OutboxPublisher {
    pub fn new(outbox: OutboxRepository, config: PublisherConfig) -> Self {
        Self { outbox, config }
    }

    /// Run the publish loop until the process is stopped.
    ///
    /// Broker connection failures are logged and retried on the next
    /// tick; they never abort the loop.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            queues = ?self.config.queues,
            interval_secs = self.config.poll_interval.as_secs(),
            "outbox publisher started"
        );

        loop {
            if let Err(e) = self.publish_pass().await {
                warn!("outbox pass failed, retrying next tick: {e}");
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Publish every unsent row once. Returns the number of rows
    /// successfully handed to the broker.
    pub async fn publish_pass(&self) -> anyhow::Result<usize> {
        let pending = self.outbox.fetch_unsent().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let broker = Broker::connect(&self.config.broker_url).await?;
        for queue in &self.config.queues {
            broker.ensure_queue(queue).await?;
        }

        let mut sent = 0;
        for event in pending {
            let body = event.payload.to_string();
            match broker
                .publish(&event.exchange, &event.routing_key, body.as_bytes())
                .await
            {
                Ok(()) => {
                    self.outbox.mark_sent(event.id).await?;
                    sent += 1;
                }
                Err(e) => {
                    error!(outbox_id = event.id, "publish failed: {e}");
                    self.outbox.mark_error(event.id, &e.to_string()).await?;
                }
            }
        }

        if sent > 0 {
            info!(sent, "outbox rows published");
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;

    #[test]
    fn test_from_broker_declares_both_queues() {
        let broker = BrokerConfig::default();
        let config = PublisherConfig::from_broker(&broker);
        assert!(config.queues.contains(&broker.submissions_queue));
        assert!(config.queues.contains(&broker.status_queue));
        assert_eq!(config.poll_interval, broker.poll_interval());
    }
}
