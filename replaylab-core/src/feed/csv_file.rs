//! CSV bar loader.
//!
//! The header row must name every column in [`REQUIRED_COLUMNS`]; extra
//! columns are ignored. The header is validated before any row is read.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::schema::{
    find_column, parse_flag, parse_level, parse_price, parse_timestamp, FeedError,
    REQUIRED_COLUMNS,
};
use crate::domain::Bar;

/// Load bars from a CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, FeedError> {
    let file = File::open(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_csv(file)?;
    tracing::debug!(path = %path.display(), bars = bars.len(), "loaded csv feed");
    Ok(bars)
}

/// Parse bars from any CSV source.
pub fn read_csv<R: Read>(source: R) -> Result<Vec<Bar>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let mut idx = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = find_column(headers.iter(), name)
            .ok_or_else(|| FeedError::MissingColumn(name.to_string()))?;
    }
    let [ts_i, open_i, high_i, low_i, close_i, long_i, short_i, sl_i, tp_i] = idx;

    let mut bars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or("");
        let invalid = |column: &'static str, value: &str| FeedError::InvalidValue {
            row,
            column,
            value: value.to_string(),
        };
        let price = |i: usize, column: &'static str| {
            parse_price(cell(i)).ok_or_else(|| invalid(column, cell(i)))
        };
        let flag = |i: usize, column: &'static str| {
            parse_flag(cell(i)).ok_or_else(|| invalid(column, cell(i)))
        };
        let level = |i: usize, column: &'static str| {
            parse_level(cell(i)).map_err(|_| invalid(column, cell(i)))
        };

        bars.push(Bar {
            timestamp: parse_timestamp(cell(ts_i)).ok_or_else(|| invalid("timestamp", cell(ts_i)))?,
            open: price(open_i, "open")?,
            high: price(high_i, "high")?,
            low: price(low_i, "low")?,
            close: price(close_i, "close")?,
            sig_long: flag(long_i, "sig_long")?,
            sig_short: flag(short_i, "sig_short")?,
            sl_level: level(sl_i, "sl_level")?,
            tp_level: level(tp_i, "tp_level")?,
        });
    }

    super::warn_on_feed_issues(&bars);
    Ok(bars)
}
