//! Binance WebSocket Adapters
//!
//! Implements the feed ports against Binance's public market streams:
//!
//! - **Client**: combined aggregate trade stream, one stream per symbol
//! - **Codec**: `aggTrade` JSON events to [`TradeEvent`](crate::domain::trade::TradeEvent)

pub mod client;
pub mod codec;
pub mod messages;

pub use client::{
    BinanceClientConfig, BinanceFeedConnector, BinanceSession, DEFAULT_BASE_URL, stream_name,
    stream_url,
};
pub use codec::AggTradeDecoder;
pub use messages::{AGG_TRADE_EVENT, AggTradeMessage, StreamEnvelope};
