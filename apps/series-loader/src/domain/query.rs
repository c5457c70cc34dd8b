//! Query Parameters
//!
//! Caller input is validated here, before any storage is touched, so a
//! malformed filter is reported as an error and never confused with
//! "no data".

use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Rejected query input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A date filter was not `YYYY-MM-DD`.
    #[error("invalid {field} date '{value}', expected YYYY-MM-DD")]
    InvalidDate {
        /// Which filter was malformed.
        field: &'static str,
        /// The rejected input.
        value: String,
    },

    /// The start date is after the end date.
    #[error("start date {start} is after end date {end}")]
    InvalidRange {
        /// Requested start.
        start: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },
}

/// A validated series query.
///
/// Dates are inclusive calendar days in UTC. A `limit` keeps only the most
/// recent rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesQuery {
    /// Upper-cased symbol, or every symbol when `None`.
    pub symbol: Option<String>,
    /// First day to include.
    pub start: Option<NaiveDate>,
    /// Last day to include.
    pub end: Option<NaiveDate>,
    /// Maximum number of rows, counted from the newest.
    pub limit: Option<usize>,
}

impl SeriesQuery {
    /// Query every row of every symbol.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one symbol.
    #[must_use]
    pub fn for_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = normalize_symbol(&symbol.into());
        self
    }

    /// Keep the newest `limit` rows.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parse caller-supplied filters.
    ///
    /// Blank strings are treated as absent. The symbol is trimmed and
    /// upper-cased, so only upper-case `symbol=` partitions and rows can
    /// match; a partition stored as `symbol=btcusd` is unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidDate`] for a date that is not
    /// `YYYY-MM-DD` and [`QueryError::InvalidRange`] when start is after end.
    pub fn parse(
        symbol: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Self, QueryError> {
        let start = parse_date("start", start)?;
        let end = parse_date("end", end)?;

        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(QueryError::InvalidRange { start, end });
        }

        Ok(Self {
            symbol: symbol.and_then(normalize_symbol),
            start,
            end,
            limit,
        })
    }

    /// Parse a raw-data query, applying `default_limit` when none is given.
    ///
    /// # Errors
    ///
    /// Same as [`SeriesQuery::parse`].
    pub fn raw(
        symbol: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        limit: Option<usize>,
        default_limit: usize,
    ) -> Result<Self, QueryError> {
        Self::parse(symbol, start, end, Some(limit.unwrap_or(default_limit)))
    }
}

fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    (!symbol.is_empty()).then(|| symbol.to_uppercase())
}

fn parse_date(field: &'static str, value: Option<&str>) -> Result<Option<NaiveDate>, QueryError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| QueryError::InvalidDate {
            field,
            value: value.to_string(),
        })
}
