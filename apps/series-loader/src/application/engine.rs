//! Retrieval Engine
//!
//! Answers series queries against the partition tree:
//!
//! 1. list candidate files by dataset, symbol, and date (path only)
//! 2. load each file, skipping any that fail
//! 3. merge into one ascending series, re-filter by row symbol, tail-limit
//!
//! Queries are read-only and share nothing, so one engine can serve any
//! number of concurrent callers.

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::domain::merge::merge_rows;
use crate::domain::partition::{DatasetKind, FileDescriptor};
use crate::domain::query::SeriesQuery;
use crate::domain::rows::{OhlcRow, SeriesRecord, SeriesRows, VolatilityRow};
use crate::infrastructure::config::LoaderConfig;
use crate::infrastructure::index::PartitionIndex;
use crate::infrastructure::metrics;
use crate::infrastructure::reader::{FromRecordBatch, read_rows};

/// Query service over a partitioned series store.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    index: PartitionIndex,
    config: LoaderConfig,
}

impl RetrievalEngine {
    /// Create an engine for the store described by `config`.
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        let index = PartitionIndex::new(&config.output_dir, &config.file_extension);
        Self { index, config }
    }

    /// Engine settings.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Underlying partition index.
    #[must_use]
    pub const fn index(&self) -> &PartitionIndex {
        &self.index
    }

    /// Run `query` against one dataset.
    #[must_use]
    pub fn query(&self, kind: DatasetKind, query: &SeriesQuery) -> SeriesRows {
        match kind {
            DatasetKind::Ohlc => SeriesRows::Ohlc(self.query_ohlc(query)),
            DatasetKind::Volatility => SeriesRows::Volatility(self.query_volatility(query)),
        }
    }

    /// Run `query` against the OHLC dataset.
    #[must_use]
    pub fn query_ohlc(&self, query: &SeriesQuery) -> Vec<OhlcRow> {
        self.run(query)
    }

    /// Run `query` against the volatility dataset.
    #[must_use]
    pub fn query_volatility(&self, query: &SeriesQuery) -> Vec<VolatilityRow> {
        self.run(query)
    }

    /// Newest row of each symbol.
    ///
    /// With `symbol` set only that symbol is consulted; otherwise every
    /// symbol the index knows of. Results are ordered by symbol and symbols
    /// without rows in `kind` are left out.
    #[must_use]
    pub fn latest(&self, kind: DatasetKind, symbol: Option<&str>) -> SeriesRows {
        match kind {
            DatasetKind::Ohlc => SeriesRows::Ohlc(self.latest_rows(symbol)),
            DatasetKind::Volatility => SeriesRows::Volatility(self.latest_rows(symbol)),
        }
    }

    /// Symbols present in any dataset, sorted.
    #[must_use]
    pub fn available_symbols(&self) -> Vec<String> {
        self.index.list_symbols().map_or_else(
            |e| {
                tracing::warn!(error = %e, "Symbol listing failed");
                Vec::new()
            },
            |symbols| symbols.into_iter().collect(),
        )
    }

    /// Partition dates present in any dataset, sorted, optionally for one
    /// symbol.
    #[must_use]
    pub fn available_dates(&self, symbol: Option<&str>) -> Vec<NaiveDate> {
        self.index.list_dates(symbol).map_or_else(
            |e| {
                tracing::warn!(error = %e, "Date listing failed");
                Vec::new()
            },
            |dates| dates.into_iter().collect(),
        )
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn latest_rows<R>(&self, symbol: Option<&str>) -> Vec<R>
    where
        R: SeriesRecord + FromRecordBatch,
    {
        let symbols: BTreeSet<String> = match symbol {
            Some(symbol) => SeriesQuery::all()
                .for_symbol(symbol)
                .symbol
                .into_iter()
                .collect(),
            None => self.available_symbols().into_iter().collect(),
        };

        symbols
            .into_iter()
            .filter_map(|symbol| {
                let query = SeriesQuery::all().for_symbol(symbol).with_limit(1);
                self.run::<R>(&query).pop()
            })
            .collect()
    }

    fn run<R>(&self, query: &SeriesQuery) -> Vec<R>
    where
        R: SeriesRecord + FromRecordBatch,
    {
        let started = Instant::now();
        let kind = R::KIND;

        let files = match self
            .index
            .list_files(kind, query.symbol.as_deref(), query.start, query.end)
        {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(dataset = %kind, error = %e, "Partition listing failed");
                Vec::new()
            }
        };

        let batches: Vec<Vec<R>> = if self.config.parallel_loads {
            files.par_iter().filter_map(load::<R>).collect()
        } else {
            files.iter().filter_map(load::<R>).collect()
        };

        let rows = merge_rows(batches, query.symbol.as_deref(), query.limit);

        let elapsed = started.elapsed();
        metrics::record_query(kind, rows.len(), elapsed);
        tracing::debug!(
            dataset = %kind,
            symbol = query.symbol.as_deref().unwrap_or("*"),
            files = files.len(),
            rows = rows.len(),
            elapsed = ?elapsed,
            "Series query complete"
        );

        rows
    }
}

/// Load one file; a failure is logged and treated as an absent file.
fn load<R: FromRecordBatch>(file: &FileDescriptor) -> Option<Vec<R>> {
    match read_rows::<R>(&file.path) {
        Ok(rows) => {
            metrics::record_file_loaded(file.kind);
            Some(rows)
        }
        Err(e) => {
            metrics::record_file_skipped(file.kind);
            tracing::warn!(
                path = %file.path.display(),
                dataset = %file.kind,
                error = %e,
                "Skipping unreadable partition file"
            );
            None
        }
    }
}
