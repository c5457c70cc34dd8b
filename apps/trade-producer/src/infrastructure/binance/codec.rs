//! Aggregate Trade Codec
//!
//! Decodes raw Binance stream text into [`TradeEvent`]s. Combined-stream
//! envelopes are unwrapped first; anything whose `e` tag is not `aggTrade`
//! (subscription acks, other event kinds) is reported as ignored.

use crate::application::ports::{DecodeError, Decoded, TradeDecoder};
use crate::domain::trade::TradeEvent;
use crate::infrastructure::binance::messages::{AGG_TRADE_EVENT, AggTradeMessage, StreamEnvelope};

/// JSON decoder for the aggregate trade stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct AggTradeDecoder;

impl AggTradeDecoder {
    /// Create a new decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn unwrap_envelope(value: serde_json::Value) -> serde_json::Value {
        let is_envelope = value.get("stream").is_some_and(serde_json::Value::is_string)
            && value.get("data").is_some();
        if !is_envelope {
            return value;
        }
        match serde_json::from_value::<StreamEnvelope>(value.clone()) {
            Ok(envelope) => envelope.data,
            Err(_) => value,
        }
    }

    fn to_event(message: AggTradeMessage) -> Result<TradeEvent, DecodeError> {
        let symbol = message.symbol.ok_or(DecodeError::MissingField("s"))?;
        let price = parse_decimal("p", message.price)?;
        let quantity = parse_decimal("q", message.quantity)?;
        let timestamp = message.trade_time.ok_or(DecodeError::MissingField("T"))?;
        let is_buyer_maker = message.is_buyer_maker.ok_or(DecodeError::MissingField("m"))?;
        let trade_id = message.agg_trade_id.ok_or(DecodeError::MissingField("a"))?;

        Ok(TradeEvent::new(
            &symbol,
            price,
            quantity,
            timestamp,
            is_buyer_maker,
            trade_id,
        )?)
    }
}

fn parse_decimal(field: &'static str, value: Option<String>) -> Result<f64, DecodeError> {
    let text = value.ok_or(DecodeError::MissingField(field))?;
    text.trim()
        .parse::<f64>()
        .map_err(|_| DecodeError::InvalidNumber { field, value: text })
}

impl TradeDecoder for AggTradeDecoder {
    fn decode(&self, raw: &str) -> Result<Decoded, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let value = Self::unwrap_envelope(value);

        let kind = value.get("e").and_then(serde_json::Value::as_str);
        if kind != Some(AGG_TRADE_EVENT) {
            return Ok(Decoded::Ignored {
                kind: kind.unwrap_or("unknown").to_string(),
            });
        }

        let message: AggTradeMessage = serde_json::from_value(value)?;
        Self::to_event(message).map(Decoded::Trade)
    }
}

// =============================================================================
// Tests
// =============================================================================
