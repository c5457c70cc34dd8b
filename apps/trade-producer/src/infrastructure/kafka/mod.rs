//! Kafka Message Bus
//!
//! Implements the bus ports with an `rdkafka` [`FutureProducer`].
//!
//! # Durability
//!
//! - `acks=all`: every in-sync replica must acknowledge a write
//! - `retries`: the client retries a failed send internally before
//!   surfacing the error
//! - `compression.type`: payloads are compressed (gzip by default)
//!
//! Connecting does not return until the broker has answered a metadata
//! request for the configured topic, so an unreachable cluster is reported
//! as a connection failure rather than as a stream of failed sends.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::application::ports::{BusConnector, BusError, DeliveryAck, MessageBus};
use crate::domain::trade::OutboundMessage;

/// Kafka producer configuration.
#[derive(Debug, Clone)]
pub struct KafkaBusConfig {
    /// Comma-separated broker list.
    pub bootstrap_servers: String,
    /// Destination topic.
    pub topic: String,
    /// Internal send retries before a delivery is reported failed.
    pub send_retries: u32,
    /// Compression codec (`gzip`, `snappy`, `lz4`, `zstd`, `none`).
    pub compression: String,
    /// Bound on waiting for one delivery acknowledgment.
    pub ack_timeout: Duration,
    /// Maximum messages per produce batch.
    pub batch_size: usize,
    /// Bound on the connect-time metadata probe.
    pub metadata_timeout: Duration,
}

impl Default for KafkaBusConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "kafka:9092".to_string(),
            topic: "crypto-trades".to_string(),
            send_retries: 3,
            compression: "gzip".to_string(),
            ack_timeout: Duration::from_secs(10),
            batch_size: 1,
            metadata_timeout: Duration::from_secs(5),
        }
    }
}

impl KafkaBusConfig {
    /// librdkafka settings for the producer.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("acks", "all")
            .set("retries", self.send_retries.to_string())
            .set("compression.type", &self.compression)
            .set("message.timeout.ms", self.ack_timeout.as_millis().to_string())
            .set("batch.num.messages", self.batch_size.max(1).to_string());
        config
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Creates [`KafkaBus`] clients.
#[derive(Debug, Clone)]
pub struct KafkaBusConnector {
    config: KafkaBusConfig,
}

impl KafkaBusConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new(config: KafkaBusConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BusConnector for KafkaBusConnector {
    type Bus = KafkaBus;

    async fn connect(&self) -> Result<KafkaBus, BusError> {
        tracing::info!(
            bootstrap_servers = %self.config.bootstrap_servers,
            topic = %self.config.topic,
            "Connecting to Kafka"
        );

        let producer: FutureProducer = self
            .config
            .client_config()
            .create()
            .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;

        let probe = producer.clone();
        let topic = self.config.topic.clone();
        let timeout = self.config.metadata_timeout;
        let metadata = tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(Some(&topic), Timeout::After(timeout))
        })
        .await
        .map_err(|e| BusError::ConnectionFailed(e.to_string()))?
        .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;

        tracing::debug!(brokers = metadata.brokers().len(), "Kafka metadata received");

        Ok(KafkaBus {
            producer,
            topic: self.config.topic.clone(),
            ack_timeout: self.config.ack_timeout,
        })
    }
}

// =============================================================================
// Bus
// =============================================================================

/// A connected Kafka producer bound to one topic.
#[derive(Clone)]
pub struct KafkaBus {
    producer: FutureProducer,
    topic: String,
    ack_timeout: Duration,
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryAck, BusError> {
        let record = FutureRecord::to(&self.topic)
            .key(message.key.as_str())
            .payload(message.payload.as_slice());

        let delivery = self.producer.send(record, Timeout::After(self.ack_timeout));
        match tokio::time::timeout(self.ack_timeout, delivery).await {
            Ok(Ok((partition, offset))) => Ok(DeliveryAck { partition, offset }),
            Ok(Err((e, _message))) => Err(BusError::DeliveryFailed(e.to_string())),
            Err(_) => Err(BusError::AckTimeout(self.ack_timeout)),
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BusError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| BusError::FlushFailed(e.to_string()))?
            .map_err(|e| BusError::FlushFailed(e.to_string()))
    }
}
