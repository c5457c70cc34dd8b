//! Trade Publisher
//!
//! Turns each [`TradeEvent`] into a keyed [`OutboundMessage`] and sends it
//! on the bus, waiting for the acknowledgment. There is no in-process retry
//! queue: a failed publish is reported to the caller, which logs and drops
//! the event. Retries and acknowledgment timeouts live inside the bus adapter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::application::ports::{BusError, DeliveryAck, MessageBus};
use crate::domain::trade::{OutboundMessage, TradeEvent};
use crate::infrastructure::metrics;

/// Default number of publishes between throughput log lines.
pub const DEFAULT_THROUGHPUT_INTERVAL: u64 = 100;

/// Publish failure for one event.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The event could not be serialized.
    #[error("failed to serialize trade: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bus did not acknowledge the message.
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl PublishError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "serialization",
            Self::Bus(BusError::AckTimeout(_)) => "ack_timeout",
            Self::Bus(_) => "delivery_failed",
        }
    }
}

/// Snapshot of publisher counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublisherStats {
    /// Acknowledged publishes.
    pub published: u64,
    /// Failed publishes.
    pub failed: u64,
    /// Throughput observations emitted.
    pub throughput_reports: u64,
    /// Time since the publisher was created.
    pub elapsed: Duration,
}

impl PublisherStats {
    /// Acknowledged publishes per second since creation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.published as f64 / secs
        } else {
            0.0
        }
    }
}

/// Sends trades to the message bus.
pub struct Publisher<B> {
    bus: B,
    published: AtomicU64,
    failed: AtomicU64,
    throughput_reports: AtomicU64,
    started_at: Instant,
    throughput_interval: u64,
}

impl<B: MessageBus> Publisher<B> {
    /// Wrap a connected bus.
    ///
    /// A throughput line is logged every `throughput_interval` acknowledged
    /// publishes (`0` disables it).
    pub fn new(bus: B, throughput_interval: u64) -> Self {
        Self {
            bus,
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            throughput_reports: AtomicU64::new(0),
            started_at: Instant::now(),
            throughput_interval,
        }
    }

    /// Publish one trade and wait for the bus acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if serialization fails or the bus does not
    /// acknowledge the message. Counters are updated either way.
    pub async fn publish(&self, event: &TradeEvent) -> Result<DeliveryAck, PublishError> {
        let result = self.send(event).await;

        match &result {
            Ok(ack) => {
                let published = self.published.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    symbol = %event.symbol(),
                    trade_id = event.trade_id(),
                    partition = ack.partition,
                    offset = ack.offset,
                    "Trade published"
                );
                if self.throughput_interval > 0 && published % self.throughput_interval == 0 {
                    self.throughput_reports.fetch_add(1, Ordering::Relaxed);
                    let stats = self.stats();
                    info!(
                        published = stats.published,
                        elapsed_secs = stats.elapsed.as_secs_f64(),
                        rate_per_sec = stats.rate(),
                        "Publish throughput"
                    );
                }
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_publish_failure(e.reason());
            }
        }

        result
    }

    async fn send(&self, event: &TradeEvent) -> Result<DeliveryAck, PublishError> {
        let message = OutboundMessage::from_event(event)?;
        let sent_at = Instant::now();
        let ack = self.bus.send(&message).await?;
        metrics::record_published(sent_at.elapsed());
        Ok(ack)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            throughput_reports: self.throughput_reports.load(Ordering::Relaxed),
            elapsed: self.started_at.elapsed(),
        }
    }

    /// Wait for all outstanding deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the bus cannot flush within `timeout`.
    pub async fn flush(&self, timeout: Duration) -> Result<(), BusError> {
        self.bus.flush(timeout).await
    }
}

// =============================================================================
// Tests
// =============================================================================
