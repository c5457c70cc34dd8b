//! Port Interfaces
//!
//! The seams between the supervisor and the outside world. Infrastructure
//! adapters implement these; tests substitute doubles.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`FeedConnector`] / [`FeedSession`]: the upstream trade feed
//! - [`TradeDecoder`]: upstream wire format to [`TradeEvent`]
//! - [`BusConnector`] / [`MessageBus`]: the durable message bus

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::supervisor::Termination;
use crate::domain::trade::{OutboundMessage, TradeEvent};

// =============================================================================
// Feed
// =============================================================================

/// Failure to establish a feed connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    /// Transport-level connection failure.
    #[error("feed connection failed: {0}")]
    ConnectionFailed(String),

    /// No symbols to subscribe to.
    #[error("no symbols configured")]
    NoSymbols,
}

/// One item read from a feed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    /// A raw text message.
    Message(String),
    /// The session ended; no further frames follow.
    Terminated(Termination),
}

/// Opens feed sessions.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Open one subscription covering all `symbols`.
    async fn connect(&self, symbols: &[String]) -> Result<Box<dyn FeedSession>, FeedError>;
}

/// A live feed subscription.
#[async_trait]
pub trait FeedSession: Send {
    /// Wait for the next raw message or the termination of the session.
    ///
    /// Transport keep-alive (ping/pong) is handled inside the session and
    /// never surfaces here.
    async fn next_frame(&mut self) -> FeedFrame;
}

/// Outcome of decoding one raw feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A valid trade to forward.
    Trade(TradeEvent),
    /// A well-formed message of another kind.
    Ignored {
        /// Message kind, for diagnostics.
        kind: String,
    },
}

/// Decode failure reasons.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not valid JSON, or wrong shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Trade message without a required field.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A numeric field could not be parsed.
    #[error("invalid number in field {field}: {value}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// Decoded values violate trade invariants.
    #[error("invalid trade: {0}")]
    InvalidTrade(#[from] crate::domain::trade::TradeEventError),
}

impl DecodeError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::MissingField(_) => "missing_field",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::InvalidTrade(_) => "invalid_trade",
        }
    }
}

/// Turns raw feed messages into trade events.
pub trait TradeDecoder: Send + Sync {
    /// Decode one raw message.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the message is malformed or is a trade
    /// event that fails validation.
    fn decode(&self, raw: &str) -> Result<Decoded, DecodeError>;
}

// =============================================================================
// Bus
// =============================================================================

/// Message bus errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// Could not reach the bus.
    #[error("bus connection failed: {0}")]
    ConnectionFailed(String),

    /// The bus rejected or failed to deliver a message.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Delivery acknowledgment did not arrive in time.
    #[error("delivery not acknowledged within {0:?}")]
    AckTimeout(Duration),

    /// Flush did not complete.
    #[error("flush failed: {0}")]
    FlushFailed(String),
}

/// Acknowledged delivery position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAck {
    /// Bus partition the message landed on.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

/// A connected bus client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Send one keyed message and wait for its acknowledgment.
    async fn send(&self, message: &OutboundMessage) -> Result<DeliveryAck, BusError>;

    /// Wait for all outstanding deliveries.
    async fn flush(&self, timeout: Duration) -> Result<(), BusError>;
}

/// Establishes bus connections.
#[async_trait]
pub trait BusConnector: Send + Sync {
    /// Bus client type produced by this connector.
    type Bus: MessageBus + 'static;

    /// Connect and verify the bus is reachable.
    async fn connect(&self) -> Result<Self::Bus, BusError>;
}
