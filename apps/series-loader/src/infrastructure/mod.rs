//! Infrastructure Layer - Filesystem and Parquet access.

/// Partition tree scanning.
pub mod index;

/// Parquet row decoding.
pub mod reader;

/// Environment configuration.
pub mod config;

/// Loader metrics.
pub mod metrics;
