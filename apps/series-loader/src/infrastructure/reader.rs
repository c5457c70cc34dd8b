//! Parquet Row Decoding
//!
//! Reads one partition file into rows. Column types are checked against
//! what the batch writer is known to produce, and coerced where the
//! difference is only representation:
//!
//! | Column      | Accepted types                                              |
//! |-------------|-------------------------------------------------------------|
//! | `timestamp` | Timestamp (any unit, any zone), Date, Int64 epoch ms, Utf8  |
//! | `symbol`    | Utf8, LargeUtf8, Utf8View, dictionary of Utf8               |
//! | prices etc. | anything castable to Float64                                |
//!
//! A file that fails any check is rejected whole.

use std::fs::File;
use std::path::Path;

use arrow::array::{
    Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::error::ArrowError;
use chrono::{DateTime, NaiveDateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;

use crate::domain::rows::{OhlcRow, VolatilityRow};

// =============================================================================
// Errors
// =============================================================================

/// Reasons a partition file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File could not be opened.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Not a readable Parquet file.
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Batch decoding or cast failed.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Required column absent.
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    /// Column present with an unusable type.
    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedType {
        /// Column name.
        column: &'static str,
        /// Arrow type found.
        data_type: String,
    },

    /// Null in a required column.
    #[error("null value in column '{column}' at row {row}")]
    NullValue {
        /// Column name.
        column: &'static str,
        /// Row within the batch.
        row: usize,
    },

    /// Timestamp value out of range or unparsable.
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Rows that can be built from a record batch.
pub trait FromRecordBatch: Sized {
    /// Decode every row of `batch`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if a required column is missing, has an
    /// unsupported type, or holds a null.
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, LoadError>;
}

impl FromRecordBatch for OhlcRow {
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, LoadError> {
        let timestamps = timestamp_column(batch)?;
        let symbols = string_column(batch, "symbol")?;
        let open = float_column(batch, "open")?;
        let high = float_column(batch, "high")?;
        let low = float_column(batch, "low")?;
        let close = float_column(batch, "close")?;
        let volume = float_column(batch, "volume")?;

        timestamps
            .into_iter()
            .enumerate()
            .map(|(row, timestamp)| {
                Ok(Self {
                    timestamp,
                    symbol: required_str(&symbols, "symbol", row)?.to_string(),
                    open: required_f64(&open, "open", row)?,
                    high: required_f64(&high, "high", row)?,
                    low: required_f64(&low, "low", row)?,
                    close: required_f64(&close, "close", row)?,
                    volume: required_f64(&volume, "volume", row)?,
                })
            })
            .collect()
    }
}

impl FromRecordBatch for VolatilityRow {
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, LoadError> {
        let timestamps = timestamp_column(batch)?;
        let symbols = string_column(batch, "symbol")?;
        let volatility = float_column(batch, "volatility")?;

        timestamps
            .into_iter()
            .enumerate()
            .map(|(row, timestamp)| {
                Ok(Self {
                    timestamp,
                    symbol: required_str(&symbols, "symbol", row)?.to_string(),
                    volatility: (!volatility.is_null(row)).then(|| volatility.value(row)),
                })
            })
            .collect()
    }
}

/// Read every row of a Parquet file.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be opened or decoded, or any
/// batch fails [`FromRecordBatch::from_batch`].
pub fn read_rows<R: FromRecordBatch>(path: &Path) -> Result<Vec<R>, LoadError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        rows.extend(R::from_batch(&batch?)?);
    }
    Ok(rows)
}

// =============================================================================
// Column Helpers
// =============================================================================

fn column<'a>(batch: &'a RecordBatch, name: &'static str) -> Result<&'a ArrayRef, LoadError> {
    batch
        .column_by_name(name)
        .ok_or(LoadError::MissingColumn(name))
}

fn unsupported(column: &'static str, data_type: &DataType) -> LoadError {
    LoadError::UnsupportedType {
        column,
        data_type: data_type.to_string(),
    }
}

fn float_column(batch: &RecordBatch, name: &'static str) -> Result<Float64Array, LoadError> {
    let source = column(batch, name)?;
    let values = cast(source, &DataType::Float64).map_err(|_| unsupported(name, source.data_type()))?;
    values
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| unsupported(name, source.data_type()))
}

fn string_column(batch: &RecordBatch, name: &'static str) -> Result<StringArray, LoadError> {
    let source = column(batch, name)?;
    let values = cast(source, &DataType::Utf8).map_err(|_| unsupported(name, source.data_type()))?;
    values
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| unsupported(name, source.data_type()))
}

fn required_f64(values: &Float64Array, column: &'static str, row: usize) -> Result<f64, LoadError> {
    if values.is_null(row) {
        return Err(LoadError::NullValue { column, row });
    }
    Ok(values.value(row))
}

fn required_str<'a>(
    values: &'a StringArray,
    column: &'static str,
    row: usize,
) -> Result<&'a str, LoadError> {
    if values.is_null(row) {
        return Err(LoadError::NullValue { column, row });
    }
    Ok(values.value(row))
}

/// Decode the `timestamp` column as UTC instants.
///
/// Zone-less timestamps and strings without an offset are read as UTC.
fn timestamp_column(batch: &RecordBatch) -> Result<Vec<DateTime<Utc>>, LoadError> {
    const NAME: &str = "timestamp";
    let source = column(batch, NAME)?;

    match source.data_type() {
        DataType::Timestamp(_, tz) => micros_to_utc(
            source,
            &DataType::Timestamp(TimeUnit::Microsecond, tz.clone()),
        ),
        DataType::Date32 | DataType::Date64 => {
            micros_to_utc(source, &DataType::Timestamp(TimeUnit::Microsecond, None))
        }
        DataType::Int64 => {
            let millis = source
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| unsupported(NAME, source.data_type()))?;
            (0..millis.len())
                .map(|row| {
                    if millis.is_null(row) {
                        return Err(LoadError::NullValue { column: NAME, row });
                    }
                    let ms = millis.value(row);
                    DateTime::from_timestamp_millis(ms)
                        .ok_or_else(|| LoadError::InvalidTimestamp(ms.to_string()))
                })
                .collect()
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let text = string_column(batch, NAME)?;
            (0..text.len())
                .map(|row| parse_timestamp(required_str(&text, NAME, row)?))
                .collect()
        }
        other => Err(unsupported(NAME, other)),
    }
}

fn micros_to_utc(source: &ArrayRef, target: &DataType) -> Result<Vec<DateTime<Utc>>, LoadError> {
    const NAME: &str = "timestamp";
    let micros = cast(source, target)?;
    let micros = micros
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| unsupported(NAME, source.data_type()))?;

    (0..micros.len())
        .map(|row| {
            if micros.is_null(row) {
                return Err(LoadError::NullValue { column: NAME, row });
            }
            let us = micros.value(row);
            DateTime::from_timestamp_micros(us)
                .ok_or_else(|| LoadError::InvalidTimestamp(us.to_string()))
        })
        .collect()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LoadError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| LoadError::InvalidTimestamp(value.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{DictionaryArray, TimestampNanosecondArray};
    use arrow::datatypes::{Field, Int32Type, Schema};
    use chrono::TimeZone;

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn floats(values: &[Option<f64>]) -> ArrayRef {
        Arc::new(Float64Array::from(values.to_vec()))
    }

    fn ohlc_columns(timestamp: ArrayRef, close: &[Option<f64>]) -> Vec<(&'static str, ArrayRef)> {
        let n = close.len();
        vec![
            ("timestamp", timestamp),
            ("symbol", Arc::new(StringArray::from(vec!["BTCUSD"; n]))),
            ("open", floats(&vec![Some(1.0); n])),
            ("high", floats(&vec![Some(2.0); n])),
            ("low", floats(&vec![Some(0.5); n])),
            ("close", floats(close)),
            ("volume", Arc::new(Int64Array::from(vec![10; n]))),
        ]
    }

    #[test]
    fn decodes_zoned_nanosecond_timestamps() {
        let ts = TimestampNanosecondArray::from(vec![1_699_444_800_000_000_000])
            .with_timezone("UTC");
        let rows = OhlcRow::from_batch(&batch(ohlc_columns(Arc::new(ts), &[Some(1.5)]))).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].timestamp,
            Utc.with_ymd_and_hms(2023, 11, 8, 12, 0, 0).unwrap()
        );
        assert_eq!(rows[0].close, 1.5);
        assert_eq!(rows[0].volume, 10.0);
    }

    #[test]
    fn offset_zone_keeps_the_same_instant() {
        let ts = TimestampNanosecondArray::from(vec![1_699_444_800_000_000_000])
            .with_timezone("+05:00");
        let rows = OhlcRow::from_batch(&batch(ohlc_columns(Arc::new(ts), &[Some(1.0)]))).unwrap();
        assert_eq!(
            rows[0].timestamp,
            Utc.with_ymd_and_hms(2023, 11, 8, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn decodes_epoch_millis() {
        let ts: ArrayRef = Arc::new(Int64Array::from(vec![1_699_444_800_000]));
        let rows = OhlcRow::from_batch(&batch(ohlc_columns(ts, &[Some(1.0)]))).unwrap();
        assert_eq!(rows[0].timestamp.timestamp_millis(), 1_699_444_800_000);
    }

    #[test]
    fn decodes_string_timestamps() {
        let ts: ArrayRef = Arc::new(StringArray::from(vec![
            "2023-11-08 12:00:01",
            "2023-11-08T12:00:02Z",
            "2023-11-08T14:00:03+02:00",
        ]));
        let vol: ArrayRef = floats(&[Some(0.1), None, Some(0.3)]);
        let symbols: ArrayRef = Arc::new(StringArray::from(vec!["BTCUSD"; 3]));
        let rows = VolatilityRow::from_batch(&batch(vec![
            ("timestamp", ts),
            ("symbol", symbols),
            ("volatility", vol),
        ]))
        .unwrap();

        let seconds: Vec<u32> = rows.iter().map(|r| chrono::Timelike::second(&r.timestamp)).collect();
        assert_eq!(seconds, vec![1, 2, 3]);
        assert!(rows.iter().all(|r| chrono::Timelike::hour(&r.timestamp) == 12));
        assert_eq!(rows[1].volatility, None);
        assert_eq!(rows[2].volatility, Some(0.3));
    }

    #[test]
    fn accepts_dictionary_symbols() {
        let ts: ArrayRef = Arc::new(Int64Array::from(vec![0, 1]));
        let symbols: DictionaryArray<Int32Type> = vec!["ETHUSD", "ETHUSD"].into_iter().collect();
        let rows = VolatilityRow::from_batch(&batch(vec![
            ("timestamp", ts),
            ("symbol", Arc::new(symbols)),
            ("volatility", floats(&[Some(0.1), Some(0.2)])),
        ]))
        .unwrap();
        assert!(rows.iter().all(|r| r.symbol == "ETHUSD"));
    }

    #[test]
    fn null_price_rejects_the_batch() {
        let ts: ArrayRef = Arc::new(Int64Array::from(vec![0, 1]));
        let err = OhlcRow::from_batch(&batch(ohlc_columns(ts, &[Some(1.0), None]))).unwrap_err();
        assert!(matches!(err, LoadError::NullValue { column: "close", row: 1 }));
    }

    #[test]
    fn missing_column_rejects_the_batch() {
        let ts: ArrayRef = Arc::new(Int64Array::from(vec![0]));
        let mut columns = ohlc_columns(ts, &[Some(1.0)]);
        columns.retain(|(name, _)| *name != "volume");
        let err = OhlcRow::from_batch(&batch(columns)).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn("volume")));
    }

    #[test]
    fn unparsable_timestamp_rejects_the_batch() {
        let ts: ArrayRef = Arc::new(StringArray::from(vec!["noon"]));
        let err = OhlcRow::from_batch(&batch(ohlc_columns(ts, &[Some(1.0)]))).unwrap_err();
        assert!(matches!(err, LoadError::InvalidTimestamp(v) if v == "noon"));
    }

    #[test]
    fn boolean_timestamp_is_unsupported() {
        let ts: ArrayRef = Arc::new(arrow::array::BooleanArray::from(vec![true]));
        let err = OhlcRow::from_batch(&batch(ohlc_columns(ts, &[Some(1.0)]))).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedType { column: "timestamp", .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_rows::<OhlcRow>(Path::new("/definitely/not/here.parquet")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
