//! Trade Event Types
//!
//! The ingestion unit of the pipeline. A [`TradeEvent`] is built once from a
//! decoded upstream message, validated on construction, and never mutated.
//! The [`OutboundMessage`] is the keyed bus record derived from it.
//!
//! # Wire Format
//!
//! The serialized payload uses fixed field names consumed by the downstream
//! batch writer:
//!
//! ```json
//! {"symbol":"BTCUSDT","price":50000.5,"quantity":0.01,
//!  "timestamp":1699564800000,"is_buyer_maker":true,"trade_id":123}
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Errors
// =============================================================================

/// Invariant violations when constructing a [`TradeEvent`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TradeEventError {
    /// Symbol was empty after trimming.
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Price must be finite and strictly positive.
    #[error("price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    /// Quantity must be finite and non-negative.
    #[error("quantity must be non-negative and finite, got {0}")]
    InvalidQuantity(f64),
}

// =============================================================================
// Trade Event
// =============================================================================

/// A normalized trade.
///
/// Fields are private so the invariants checked by [`TradeEvent::new`]
/// (upper-case symbol, `price > 0`, `quantity >= 0`) hold for every value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    symbol: String,
    price: f64,
    quantity: f64,
    timestamp: i64,
    is_buyer_maker: bool,
    trade_id: i64,
}

impl TradeEvent {
    /// Build a validated trade event.
    ///
    /// The symbol is trimmed and upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`TradeEventError`] if the symbol is empty, the price is not
    /// strictly positive, or the quantity is negative (or either is not finite).
    pub fn new(
        symbol: &str,
        price: f64,
        quantity: f64,
        timestamp_ms: i64,
        is_buyer_maker: bool,
        trade_id: i64,
    ) -> Result<Self, TradeEventError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(TradeEventError::EmptySymbol);
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(TradeEventError::InvalidPrice(price));
        }
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(TradeEventError::InvalidQuantity(quantity));
        }

        Ok(Self {
            symbol,
            price,
            quantity,
            timestamp: timestamp_ms,
            is_buyer_maker,
            trade_id,
        })
    }

    /// Upper-case trading symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Trade price.
    #[must_use]
    pub const fn price(&self) -> f64 {
        self.price
    }

    /// Trade quantity.
    #[must_use]
    pub const fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Trade time in epoch milliseconds.
    #[must_use]
    pub const fn timestamp_ms(&self) -> i64 {
        self.timestamp
    }

    /// Whether the buyer was the maker.
    #[must_use]
    pub const fn is_buyer_maker(&self) -> bool {
        self.is_buyer_maker
    }

    /// Upstream aggregate trade id (monotonic per symbol only).
    #[must_use]
    pub const fn trade_id(&self) -> i64 {
        self.trade_id
    }
}

// =============================================================================
// Outbound Message
// =============================================================================

/// A keyed bus record.
///
/// The key is always the symbol so every event of a symbol lands on the same
/// bus partition and per-symbol order can be reconstructed downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Partition key (the symbol).
    pub key: String,
    /// JSON-serialized [`TradeEvent`].
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    /// Build the bus record for a trade.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn from_event(event: &TradeEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            key: event.symbol.clone(),
            payload: serde_json::to_vec(event)?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
