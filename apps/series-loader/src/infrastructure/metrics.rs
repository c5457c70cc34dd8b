//! Loader Metrics
//!
//! Recorded through the `metrics` facade, labelled by dataset. The host
//! process installs the recorder; without one every call is a no-op.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::domain::partition::DatasetKind;

/// Describe loader metrics on the installed recorder.
pub fn register_metrics() {
    describe_counter!(
        "series_loader_files_loaded_total",
        "Partition files decoded successfully"
    );
    describe_counter!(
        "series_loader_files_skipped_total",
        "Partition files skipped because they could not be read"
    );
    describe_counter!(
        "series_loader_rows_returned_total",
        "Rows returned to callers"
    );
    describe_histogram!(
        "series_loader_query_duration_seconds",
        "Wall time of one series query"
    );
}

/// Record a successfully decoded file.
pub fn record_file_loaded(kind: DatasetKind) {
    counter!("series_loader_files_loaded_total", "dataset" => kind.as_str()).increment(1);
}

/// Record a file skipped after a read failure.
pub fn record_file_skipped(kind: DatasetKind) {
    counter!("series_loader_files_skipped_total", "dataset" => kind.as_str()).increment(1);
}

/// Record a finished query.
pub fn record_query(kind: DatasetKind, rows: usize, elapsed: Duration) {
    counter!("series_loader_rows_returned_total", "dataset" => kind.as_str())
        .increment(u64::try_from(rows).unwrap_or(u64::MAX));
    histogram!("series_loader_query_duration_seconds", "dataset" => kind.as_str())
        .record(elapsed.as_secs_f64());
}
