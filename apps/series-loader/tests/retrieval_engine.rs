//! Retrieval engine tests against real Parquet partition trees.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, RecordBatch, StringArray, TimestampNanosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parquet::arrow::ArrowWriter;
use series_loader::{
    DatasetKind, LoaderConfig, QueryError, RetrievalEngine, SeriesQuery, SeriesRows,
};
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

fn at(h: u32, m: u32, s: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 11, day, h, m, s).unwrap()
}

fn nanos(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap()
}

fn write_batch(path: &Path, batch: &RecordBatch) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

fn timestamp_field() -> Field {
    Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
        false,
    )
}

/// Write OHLC bars; `close` doubles as a row tag.
fn write_ohlc(root: &Path, relative: &str, rows: &[(DateTime<Utc>, &str, f64)]) {
    let schema = Arc::new(Schema::new(vec![
        timestamp_field(),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("open", DataType::Float64, false),
        Field::new("high", DataType::Float64, false),
        Field::new("low", DataType::Float64, false),
        Field::new("close", DataType::Float64, false),
        Field::new("volume", DataType::Float64, false),
    ]));
    let n = rows.len();
    let constant = |v: f64| -> ArrayRef { Arc::new(Float64Array::from(vec![v; n])) };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(
            TimestampNanosecondArray::from(rows.iter().map(|r| nanos(r.0)).collect::<Vec<_>>())
                .with_timezone("UTC"),
        ),
        Arc::new(StringArray::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
        constant(1.0),
        constant(2.0),
        constant(0.5),
        Arc::new(Float64Array::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
        constant(100.0),
    ];
    write_batch(
        &root.join(relative),
        &RecordBatch::try_new(schema, columns).unwrap(),
    );
}

fn write_volatility(root: &Path, relative: &str, rows: &[(DateTime<Utc>, &str, Option<f64>)]) {
    let schema = Arc::new(Schema::new(vec![
        timestamp_field(),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("volatility", DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(
            TimestampNanosecondArray::from(rows.iter().map(|r| nanos(r.0)).collect::<Vec<_>>())
                .with_timezone("UTC"),
        ),
        Arc::new(StringArray::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
    ];
    write_batch(
        &root.join(relative),
        &RecordBatch::try_new(schema, columns).unwrap(),
    );
}

fn engine(root: &Path) -> RetrievalEngine {
    RetrievalEngine::new(LoaderConfig::with_output_dir(root))
}

fn sequential_engine(root: &Path) -> RetrievalEngine {
    RetrievalEngine::new(LoaderConfig {
        parallel_loads: false,
        ..LoaderConfig::with_output_dir(root)
    })
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Two BTCUSD days with interleaved bar times.
fn two_day_store() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_ohlc(
        dir.path(),
        "ohlc/symbol=BTCUSD/date=2023-11-08/part-0.parquet",
        &[(at(12, 0, 0, 8), "BTCUSD", 0.0), (at(12, 0, 2, 8), "BTCUSD", 2.0)],
    );
    write_ohlc(
        dir.path(),
        "ohlc/symbol=BTCUSD/date=2023-11-09/part-0.parquet",
        &[(at(12, 0, 1, 8), "BTCUSD", 1.0), (at(12, 0, 3, 8), "BTCUSD", 3.0)],
    );
    dir
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn tail_limit_spans_partitions() {
    let dir = two_day_store();

    for engine in [engine(dir.path()), sequential_engine(dir.path())] {
        let query = SeriesQuery::parse(Some("BTCUSD"), None, None, Some(3)).unwrap();
        let rows = engine.query_ohlc(&query);

        let times: Vec<_> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![at(12, 0, 1, 8), at(12, 0, 2, 8), at(12, 0, 3, 8)]);
    }
}

#[test]
fn unlimited_query_returns_every_row_in_order() {
    let dir = two_day_store();
    let rows = engine(dir.path()).query_ohlc(&SeriesQuery::all());

    let tags: Vec<_> = rows.iter().map(|r| r.close).collect();
    assert_eq!(tags, vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn repeated_queries_are_identical() {
    let dir = two_day_store();
    let engine = engine(dir.path());
    let query = SeriesQuery::all().for_symbol("BTCUSD").with_limit(2);

    assert_eq!(engine.query_ohlc(&query), engine.query_ohlc(&query));
}

#[test]
fn date_window_is_inclusive_and_path_based() {
    let dir = two_day_store();
    let engine = engine(dir.path());

    let query = SeriesQuery::parse(Some("BTCUSD"), Some("2023-11-09"), Some("2023-11-09"), None)
        .unwrap();
    let tags: Vec<_> = engine.query_ohlc(&query).iter().map(|r| r.close).collect();
    // Rows of the 2023-11-09 file carry 2023-11-08 times; only the path decides.
    assert_eq!(tags, vec![1.0, 3.0]);

    let query = SeriesQuery::parse(None, Some("2023-11-10"), None, None).unwrap();
    assert!(engine.query_ohlc(&query).is_empty());
}

#[test]
fn rows_for_another_symbol_are_filtered_by_content() {
    let dir = TempDir::new().unwrap();
    write_ohlc(
        dir.path(),
        "ohlc/symbol=BTCUSD/date=2023-11-08/part-0.parquet",
        &[(at(12, 0, 0, 8), "BTCUSD", 0.0), (at(12, 0, 1, 8), "ETHUSD", 1.0)],
    );
    let engine = engine(dir.path());

    let rows = engine.query_ohlc(&SeriesQuery::all().for_symbol("BTCUSD"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].symbol, "BTCUSD");

    // Without a symbol filter the stray row is returned as stored.
    assert_eq!(engine.query_ohlc(&SeriesQuery::all()).len(), 2);
}

#[test]
fn symbol_filter_does_not_match_prefixes() {
    let dir = two_day_store();
    write_ohlc(
        dir.path(),
        "ohlc/symbol=BTCUSDT/date=2023-11-08/part-0.parquet",
        &[(at(13, 0, 0, 8), "BTCUSDT", 9.0)],
    );
    let engine = engine(dir.path());

    assert_eq!(engine.query_ohlc(&SeriesQuery::all().for_symbol("BTCUSD")).len(), 4);
    assert_eq!(engine.query_ohlc(&SeriesQuery::all().for_symbol("BTCUSDT")).len(), 1);
}

#[test]
fn corrupt_file_is_skipped() {
    let dir = two_day_store();
    let corrupt = dir
        .path()
        .join("ohlc/symbol=BTCUSD/date=2023-11-09/part-1.parquet");
    fs::write(&corrupt, b"PAR1 truncated").unwrap();

    let rows = engine(dir.path()).query_ohlc(&SeriesQuery::all().for_symbol("BTCUSD"));
    assert_eq!(rows.len(), 4);
}

#[test]
fn file_with_wrong_schema_is_skipped() {
    let dir = two_day_store();
    // Volatility rows placed under ohlc lack the price columns.
    write_volatility(
        dir.path(),
        "ohlc/symbol=BTCUSD/date=2023-11-09/part-1.parquet",
        &[(at(12, 0, 9, 8), "BTCUSD", Some(0.1))],
    );

    let rows = engine(dir.path()).query_ohlc(&SeriesQuery::all());
    assert_eq!(rows.len(), 4);
}

#[cfg(unix)]
#[test]
fn symlink_loop_does_not_duplicate_rows() {
    let dir = two_day_store();
    std::os::unix::fs::symlink(
        ".",
        dir.path().join("ohlc/symbol=BTCUSD/date=2023-11-08/again"),
    )
    .unwrap();

    let engine = engine(dir.path());
    let rows = engine.query_ohlc(&SeriesQuery::all().for_symbol("BTCUSD"));
    assert_eq!(rows.len(), 4);

    let tail = engine.query_ohlc(&SeriesQuery::all().for_symbol("BTCUSD").with_limit(3));
    let tags: Vec<_> = tail.iter().map(|r| r.close).collect();
    assert_eq!(tags, vec![1.0, 2.0, 3.0]);
}

#[test]
fn undated_file_survives_any_date_filter() {
    let dir = two_day_store();
    write_ohlc(
        dir.path(),
        "ohlc/symbol=BTCUSD/legacy.parquet",
        &[(at(11, 0, 0, 1), "BTCUSD", -1.0)],
    );

    let query = SeriesQuery::parse(Some("BTCUSD"), Some("2030-01-01"), Some("2030-01-31"), None)
        .unwrap();
    let rows = engine(dir.path()).query_ohlc(&query);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close, -1.0);
}

#[test]
fn empty_store_yields_empty_results() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir.path().join("missing"));

    let query = SeriesQuery::parse(Some("BTCUSD"), Some("2023-11-08"), None, Some(10)).unwrap();
    assert!(engine.query_ohlc(&query).is_empty());
    assert!(engine.query_volatility(&query).is_empty());
}

#[test]
fn malformed_date_is_an_error_not_empty_data() {
    let err = SeriesQuery::parse(Some("BTCUSD"), Some("08-11-2023"), None, None).unwrap_err();
    assert!(matches!(err, QueryError::InvalidDate { field: "start", .. }));
}

#[test]
fn raw_query_uses_configured_default_limit() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<_> = (0..5)
        .map(|s| (at(12, 0, s, 8), "BTCUSD", f64::from(s)))
        .collect();
    write_ohlc(
        dir.path(),
        "ohlc/symbol=BTCUSD/date=2023-11-08/part-0.parquet",
        &rows,
    );
    let engine = RetrievalEngine::new(LoaderConfig {
        default_limit: 2,
        ..LoaderConfig::with_output_dir(dir.path())
    });

    let query =
        SeriesQuery::raw(Some("BTCUSD"), None, None, None, engine.config().default_limit).unwrap();
    let tags: Vec<_> = engine.query_ohlc(&query).iter().map(|r| r.close).collect();
    assert_eq!(tags, vec![3.0, 4.0]);
}

// =============================================================================
// Volatility
// =============================================================================

#[test]
fn leading_null_volatility_is_preserved() {
    let dir = TempDir::new().unwrap();
    write_volatility(
        dir.path(),
        "volatility/symbol=BTCUSD/date=2023-11-08/part-0.parquet",
        &[
            (at(12, 0, 0, 8), "BTCUSD", None),
            (at(12, 0, 1, 8), "BTCUSD", Some(0.25)),
        ],
    );

    let rows = engine(dir.path()).query(DatasetKind::Volatility, &SeriesQuery::all());
    let SeriesRows::Volatility(rows) = rows else {
        panic!("expected volatility rows");
    };
    assert_eq!(rows[0].volatility, None);
    assert_eq!(rows[1].volatility, Some(0.25));
}

// =============================================================================
// Latest and Discovery
// =============================================================================

#[test]
fn latest_returns_newest_row_per_symbol() {
    let dir = two_day_store();
    write_ohlc(
        dir.path(),
        "ohlc/symbol=ETHUSD/date=2023-11-08/part-0.parquet",
        &[(at(9, 0, 0, 8), "ETHUSD", 10.0), (at(10, 0, 0, 8), "ETHUSD", 11.0)],
    );
    write_volatility(
        dir.path(),
        "volatility/symbol=SOLUSD/date=2023-11-08/part-0.parquet",
        &[(at(12, 0, 0, 8), "SOLUSD", Some(0.5))],
    );
    let engine = engine(dir.path());

    let SeriesRows::Ohlc(latest) = engine.latest(DatasetKind::Ohlc, None) else {
        panic!("expected ohlc rows");
    };
    let summary: Vec<_> = latest.iter().map(|r| (r.symbol.as_str(), r.close)).collect();
    assert_eq!(summary, vec![("BTCUSD", 3.0), ("ETHUSD", 11.0)]);

    let SeriesRows::Ohlc(one) = engine.latest(DatasetKind::Ohlc, Some("ethusd")) else {
        panic!("expected ohlc rows");
    };
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].close, 11.0);

    assert!(engine.latest(DatasetKind::Ohlc, Some("DOGEUSD")).is_empty());
}

#[test]
fn discovery_lists_symbols_and_dates() {
    let dir = two_day_store();
    write_volatility(
        dir.path(),
        "volatility/symbol=ETHUSD/date=2023-11-10/part-0.parquet",
        &[(at(12, 0, 0, 10), "ETHUSD", Some(0.5))],
    );
    let engine = engine(dir.path());

    assert_eq!(engine.available_symbols(), vec!["BTCUSD", "ETHUSD"]);
    assert_eq!(
        engine.available_dates(None),
        vec![date("2023-11-08"), date("2023-11-09"), date("2023-11-10")]
    );
    assert_eq!(
        engine.available_dates(Some("BTCUSD")),
        vec![date("2023-11-08"), date("2023-11-09")]
    );
}
