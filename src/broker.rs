//! RabbitMQ plumbing shared by the outbox publisher and the pipeline
//! worker.
//!
//! Publishes are confirmed and persistent; consumers run with a
//! prefetch of one so a crashed worker forfeits at most one in-flight
//! message.

use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
    QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use thiserror::Error;
use tracing::{debug, info};

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(String),
    #[error("broker channel error: {0}")]
    Channel(#[from] lapin::Error),
    #[error("broker did not confirm publish of message to {0}")]
    Unconfirmed(String),
}

/// One AMQP connection with a channel in confirm mode.
pub struct Broker {
    channel: Channel,
}

impl Broker {
    /// Connect and put the channel into publisher-confirm mode.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        info!("connected to message broker");
        Ok(Self { channel })
    }

    /// Declare a durable queue, creating it if absent.
    pub async fn ensure_queue(&self, queue: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    /// Publish a persistent message and wait for the broker's confirm.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await?
            .await?;

        match confirm {
            Confirmation::NotRequested | Confirmation::Ack(_) => {
                debug!(routing_key, "publish confirmed");
                Ok(())
            }
            Confirmation::Nack(_) => Err(BrokerError::Unconfirmed(routing_key.to_string())),
        }
    }

    /// Start consuming a queue with a prefetch window of one message.
    pub async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, BrokerError> {
        self.ensure_queue(queue).await?;
        self.channel
            .basic_qos(1, BasicQosOptions::default())
            .await?;
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        info!(queue, "consuming");
        Ok(consumer)
    }
}
