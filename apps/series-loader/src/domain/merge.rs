//! Merging loaded files into one series.

use super::rows::SeriesRecord;

/// Combine per-file rows into a single ascending series.
///
/// Rows are stable-sorted by timestamp (ties keep file order), then
/// filtered to `symbol` by row content, then cut to the newest `limit`.
#[must_use]
pub fn merge_rows<R: SeriesRecord>(
    batches: Vec<Vec<R>>,
    symbol: Option<&str>,
    limit: Option<usize>,
) -> Vec<R> {
    let mut rows: Vec<R> = batches.into_iter().flatten().collect();
    rows.sort_by_key(|row| row.timestamp());

    if let Some(symbol) = symbol {
        rows.retain(|row| row.symbol() == symbol);
    }

    if let Some(limit) = limit {
        let excess = rows.len().saturating_sub(limit);
        rows.drain(..excess);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rows::VolatilityRow;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_699_444_800 + secs, 0).unwrap()
    }

    fn row(symbol: &str, secs: i64, tag: f64) -> VolatilityRow {
        VolatilityRow {
            timestamp: at(secs),
            symbol: symbol.to_string(),
            volatility: Some(tag),
        }
    }

    #[test]
    fn interleaves_files_by_time() {
        let merged = merge_rows(
            vec![
                vec![row("BTCUSD", 0, 0.0), row("BTCUSD", 2, 0.0)],
                vec![row("BTCUSD", 1, 0.0), row("BTCUSD", 3, 0.0)],
            ],
            Some("BTCUSD"),
            Some(3),
        );
        let times: Vec<_> = merged.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![at(1), at(2), at(3)]);
    }

    #[test]
    fn equal_timestamps_keep_file_order() {
        let merged = merge_rows(
            vec![vec![row("BTCUSD", 5, 1.0)], vec![row("BTCUSD", 5, 2.0)]],
            None,
            None,
        );
        let tags: Vec<_> = merged.iter().map(|r| r.volatility).collect();
        assert_eq!(tags, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn content_symbol_filter_drops_strays() {
        let merged = merge_rows(
            vec![vec![row("BTCUSD", 0, 0.0), row("ETHUSD", 1, 0.0)]],
            Some("BTCUSD"),
            None,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].symbol, "BTCUSD");
    }

    #[test]
    fn limit_applies_after_symbol_filter() {
        let merged = merge_rows(
            vec![vec![
                row("BTCUSD", 0, 0.0),
                row("ETHUSD", 1, 0.0),
                row("ETHUSD", 2, 0.0),
            ]],
            Some("BTCUSD"),
            Some(1),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].timestamp, at(0));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let merged: Vec<VolatilityRow> = merge_rows(Vec::new(), Some("BTCUSD"), Some(10));
        assert!(merged.is_empty());
    }

    #[test]
    fn zero_limit_gives_empty_output() {
        let merged = merge_rows(vec![vec![row("BTCUSD", 0, 0.0)]], None, Some(0));
        assert!(merged.is_empty());
    }

    fn batches() -> impl Strategy<Value = Vec<Vec<VolatilityRow>>> {
        let symbol = prop_oneof![Just("BTCUSD"), Just("ETHUSD")];
        let entry = (symbol, 0i64..500).prop_map(|(s, t)| row(s, t, 0.0));
        prop::collection::vec(prop::collection::vec(entry, 0..20), 0..6)
    }

    proptest! {
        #[test]
        fn output_is_sorted(input in batches()) {
            let merged = merge_rows(input, None, None);
            prop_assert!(merged.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }

        #[test]
        fn limit_keeps_the_newest_rows(input in batches(), limit in 0usize..40) {
            let full = merge_rows(input.clone(), None, None);
            let tail = merge_rows(input, None, Some(limit));
            prop_assert_eq!(tail.len(), limit.min(full.len()));
            prop_assert_eq!(&full[full.len() - tail.len()..], tail.as_slice());
        }

        #[test]
        fn symbol_filter_is_idempotent(input in batches()) {
            let expected = input.iter().flatten().filter(|r| r.symbol == "BTCUSD").count();
            let once = merge_rows(input, Some("BTCUSD"), None);
            prop_assert_eq!(once.len(), expected);
            let twice = merge_rows(vec![once.clone()], Some("BTCUSD"), None);
            prop_assert!(once.iter().all(|r| r.symbol == "BTCUSD"));
            prop_assert_eq!(once, twice);
        }
    }
}
