#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Trade Producer - Resilient Trade Feed Ingestion
//!
//! Maintains one long-lived subscription to the Binance aggregate trade
//! stream and republishes every trade as a keyed JSON message on a Kafka
//! topic, surviving feed disconnects and bus hiccups.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and rules
//!   - `trade`: Validated trade events and keyed bus records
//!   - `supervisor`: Connection state machine and backoff policy
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Feed, decoder, and bus interfaces
//!   - `services`: Publisher and connection supervisor
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: WebSocket client and `aggTrade` codec
//!   - `kafka`: `rdkafka` producer
//!   - `config`: Environment configuration
//!   - `health`: Health check and metrics HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Binance WS ──► decode ──► Publisher ──► Kafka topic (key = symbol)
//!      ▲                                        │
//!      └──── ConnectionSupervisor (reconnect) ──┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::supervisor::{
    BackoffPolicy, InvalidTransition, SupervisorEvent, SupervisorState, Termination,
};
pub use domain::trade::{OutboundMessage, TradeEvent, TradeEventError};

// Ports and services
pub use application::ports::{
    BusConnector, BusError, DecodeError, Decoded, DeliveryAck, FeedConnector, FeedError,
    FeedFrame, FeedSession, MessageBus, TradeDecoder,
};
pub use application::services::{
    ConnectionSupervisor, PublishError, Publisher, PublisherStats, SupervisorConfig,
    SupervisorError, SupervisorReport, SupervisorStatus,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ProducerConfig};

// Adapters
pub use infrastructure::binance::{AggTradeDecoder, BinanceFeedConnector};
pub use infrastructure::kafka::{KafkaBus, KafkaBusConnector};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
