//! Domain Layer - Partition keys, series rows, and the merge rules.
//!
//! Pure types and functions. Nothing here touches the filesystem.

/// Dataset kinds and path-derived partition keys.
pub mod partition;

/// OHLC and volatility rows.
pub mod rows;

/// Validated query parameters.
pub mod query;

/// Sort, filter, and tail-limit over loaded rows.
pub mod merge;
