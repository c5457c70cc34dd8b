#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::needless_pass_by_value
    )
)]

//! Series Loader - Partitioned Time-Series Retrieval
//!
//! Serves OHLC and volatility series from the partition tree written by
//! the batch job downstream of the trade producer.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Partition keys, rows, query validation, merge rules
//! - **Application**: `RetrievalEngine`
//! - **Infrastructure**: Partition index, Parquet decoding, config, metrics
//!
//! # Storage Layout
//!
//! ```text
//! <OUTPUT_DIR>/
//! ├── ohlc/
//! │   └── symbol=BTCUSD/
//! │       ├── date=2023-11-08/part-0.parquet
//! │       └── date=2023-11-09/part-0.parquet
//! └── volatility/
//!     └── symbol=BTCUSD/...
//! ```
//!
//! # Example
//!
//! ```no_run
//! use series_loader::{LoaderConfig, RetrievalEngine, SeriesQuery};
//!
//! let engine = RetrievalEngine::new(LoaderConfig::from_env());
//! let query = SeriesQuery::parse(Some("BTCUSD"), None, None, Some(3))?;
//! for row in engine.query_ohlc(&query) {
//!     println!("{} {}", row.timestamp, row.close);
//! }
//! # Ok::<(), series_loader::QueryError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Query service.
pub mod application;

/// Infrastructure layer - Filesystem and Parquet access.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

pub use domain::merge::merge_rows;
pub use domain::partition::{DatasetKind, FileDescriptor, PartitionKey, parse_partition_key};
pub use domain::query::{QueryError, SeriesQuery};
pub use domain::rows::{OhlcRow, SeriesRecord, SeriesRows, VolatilityRow};

pub use application::RetrievalEngine;

pub use infrastructure::config::LoaderConfig;
pub use infrastructure::index::{PartitionError, PartitionIndex};
pub use infrastructure::metrics::register_metrics;
pub use infrastructure::reader::{FromRecordBatch, LoadError, read_rows};
