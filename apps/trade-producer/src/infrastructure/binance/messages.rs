//! Binance Stream Message Types
//!
//! Wire format types for the Binance combined market stream.
//!
//! A combined stream wraps every event in an envelope naming its source:
//!
//! ```json
//! {"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","s":"BTCUSDT",...}}
//! ```
//!
//! Single-stream connections deliver the bare event. Numeric prices and
//! quantities arrive as strings to preserve precision.
//!
//! # References
//!
//! - [Aggregate Trade Streams](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams#aggregate-trade-streams)

use serde::Deserialize;

/// Event type tag of aggregate trades.
pub const AGG_TRADE_EVENT: &str = "aggTrade";

/// Combined-stream wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    /// Source stream name, e.g. `btcusdt@aggTrade`.
    pub stream: String,
    /// Wrapped event.
    pub data: serde_json::Value,
}

/// Aggregate trade event.
///
/// Every field is optional so a missing field is reported by name instead
/// of as a generic parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggTradeMessage {
    /// Event type (`aggTrade`).
    #[serde(rename = "e")]
    pub event_type: Option<String>,
    /// Event time (ms).
    #[serde(rename = "E")]
    pub event_time: Option<i64>,
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: Option<String>,
    /// Aggregate trade id.
    #[serde(rename = "a")]
    pub agg_trade_id: Option<i64>,
    /// Price.
    #[serde(rename = "p")]
    pub price: Option<String>,
    /// Quantity.
    #[serde(rename = "q")]
    pub quantity: Option<String>,
    /// First trade id.
    #[serde(rename = "f")]
    pub first_trade_id: Option<i64>,
    /// Last trade id.
    #[serde(rename = "l")]
    pub last_trade_id: Option<i64>,
    /// Trade time (ms).
    #[serde(rename = "T")]
    pub trade_time: Option<i64>,
    /// Whether the buyer was the maker.
    #[serde(rename = "m")]
    pub is_buyer_maker: Option<bool>,
}
