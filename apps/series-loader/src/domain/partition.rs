//! Partition Keys
//!
//! Stored series live under a hive-style tree:
//!
//! ```text
//! <root>/<kind>/symbol=<SYMBOL>/date=<YYYY-MM-DD>/<file>.parquet
//! ```
//!
//! The partition a file belongs to is read from its `key=value` path
//! segments, never from its contents.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const SYMBOL_SEGMENT: &str = "symbol";
const DATE_SEGMENT: &str = "date";
const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Dataset Kind
// =============================================================================

/// Which aggregated series a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Open/high/low/close/volume bars.
    Ohlc,
    /// Rolling volatility.
    Volatility,
}

impl DatasetKind {
    /// Every dataset kind, in directory order.
    pub const ALL: [Self; 2] = [Self::Ohlc, Self::Volatility];

    /// Directory name under the storage root; also used as the metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ohlc => "ohlc",
            Self::Volatility => "volatility",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized dataset name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dataset kind: {0}")]
pub struct UnknownDatasetKind(pub String);

impl FromStr for DatasetKind {
    type Err = UnknownDatasetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ohlc" => Ok(Self::Ohlc),
            "volatility" => Ok(Self::Volatility),
            _ => Err(UnknownDatasetKind(s.to_string())),
        }
    }
}

// =============================================================================
// Partition Key
// =============================================================================

/// Symbol and date read from a file path.
///
/// Either part is `None` when the path has no matching segment or the
/// segment value is unusable (an empty symbol, a malformed date).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Value of the `symbol=` segment.
    pub symbol: Option<String>,
    /// Value of the `date=` segment.
    pub date: Option<NaiveDate>,
}

impl PartitionKey {
    /// Whether the key's date lies inside `[start, end]`.
    ///
    /// A key without a date is never excluded.
    #[must_use]
    pub fn within(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        let Some(date) = self.date else {
            return true;
        };
        start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
    }

    /// Whether the key's symbol is exactly `symbol`.
    #[must_use]
    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbol.as_deref() == Some(symbol)
    }
}

/// Split a `key=value` path segment.
#[must_use]
pub fn segment_value<'a>(segment: &'a str, key: &str) -> Option<&'a str> {
    segment
        .split_once('=')
        .and_then(|(k, v)| (k == key).then_some(v))
}

/// Parse a `date=` directory value.
#[must_use]
pub fn parse_partition_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Read the partition key from a path.
///
/// Every component is inspected; when a key appears more than once the
/// segment closest to the file wins.
#[must_use]
pub fn parse_partition_key(path: &Path) -> PartitionKey {
    let mut key = PartitionKey::default();

    for component in path.components() {
        let Component::Normal(segment) = component else {
            continue;
        };
        let Some(segment) = segment.to_str() else {
            continue;
        };

        if let Some(symbol) = segment_value(segment, SYMBOL_SEGMENT) {
            key.symbol = (!symbol.is_empty()).then(|| symbol.to_string());
        } else if let Some(date) = segment_value(segment, DATE_SEGMENT) {
            key.date = parse_partition_date(date);
        }
    }

    key
}

// =============================================================================
// File Descriptor
// =============================================================================

/// A stored series file and the partition it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// File path.
    pub path: PathBuf,
    /// Dataset the file was found under.
    pub kind: DatasetKind,
    /// Partition key read from the path below the dataset directory.
    pub key: PartitionKey,
}

// =============================================================================
// Tests
// =============================================================================
