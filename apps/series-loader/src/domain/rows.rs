//! Series Rows
//!
//! One row per bar. Timestamps are normalized to UTC on load.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::partition::DatasetKind;

/// Behaviour shared by every stored row type.
pub trait SeriesRecord: Send + 'static {
    /// Dataset the row type is stored under.
    const KIND: DatasetKind;

    /// Bar time.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Symbol read from the row itself.
    fn symbol(&self) -> &str;
}

/// An OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcRow {
    /// Bar time (UTC).
    pub timestamp: DateTime<Utc>,
    /// Trading pair.
    pub symbol: String,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

impl SeriesRecord for OhlcRow {
    const KIND: DatasetKind = DatasetKind::Ohlc;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// A volatility observation.
///
/// `volatility` is `None` for the leading rows of a rolling window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityRow {
    /// Observation time (UTC).
    pub timestamp: DateTime<Utc>,
    /// Trading pair.
    pub symbol: String,
    /// Rolling volatility.
    pub volatility: Option<f64>,
}

impl SeriesRecord for VolatilityRow {
    const KIND: DatasetKind = DatasetKind::Volatility;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Rows returned by a kind-agnostic query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesRows {
    /// OHLC bars.
    Ohlc(Vec<OhlcRow>),
    /// Volatility observations.
    Volatility(Vec<VolatilityRow>),
}

impl SeriesRows {
    /// Dataset the rows came from.
    #[must_use]
    pub const fn kind(&self) -> DatasetKind {
        match self {
            Self::Ohlc(_) => DatasetKind::Ohlc,
            Self::Volatility(_) => DatasetKind::Volatility,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Ohlc(rows) => rows.len(),
            Self::Volatility(rows) => rows.len(),
        }
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row timestamps in result order.
    #[must_use]
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        match self {
            Self::Ohlc(rows) => rows.iter().map(|row| row.timestamp).collect(),
            Self::Volatility(rows) => rows.iter().map(|row| row.timestamp).collect(),
        }
    }
}
