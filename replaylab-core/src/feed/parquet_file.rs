//! Parquet bar loader (polars).
//!
//! Numeric columns are cast to `Float64`, signal columns to `Boolean`. The
//! timestamp column may be a datetime of any unit or a string. Zoned datetimes
//! become wall-clock time in their own zone.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

use super::schema::{find_column, parse_timestamp, FeedError, REQUIRED_COLUMNS};
use crate::domain::Bar;

/// Load bars from a Parquet file.
pub fn load_parquet(path: &Path) -> Result<Vec<Bar>, FeedError> {
    let file = File::open(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| FeedError::Parquet(format!("read: {e}")))?;
    let bars = dataframe_to_bars(&df)?;
    tracing::debug!(path = %path.display(), bars = bars.len(), "loaded parquet feed");
    Ok(bars)
}

/// Convert a DataFrame with the bar schema into bars.
pub fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, FeedError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for name in REQUIRED_COLUMNS {
        let i = find_column(names.iter().map(String::as_str), name)
            .ok_or_else(|| FeedError::MissingColumn(name.to_string()))?;
        columns.push(names[i].as_str());
    }

    let column = |i: usize| {
        df.column(columns[i])
            .map_err(|e| FeedError::Parquet(format!("column {}: {e}", REQUIRED_COLUMNS[i])))
    };
    let cast = |i: usize, dtype: DataType| {
        column(i)?
            .cast(&dtype)
            .map_err(|e| FeedError::Parquet(format!("{} cast: {e}", REQUIRED_COLUMNS[i])))
    };
    let type_err =
        |i: usize| move |e: PolarsError| FeedError::Parquet(format!("{} type: {e}", REQUIRED_COLUMNS[i]));

    let timestamps = read_timestamps(column(0)?)?;

    let (open, high, low, close) = (
        cast(1, DataType::Float64)?,
        cast(2, DataType::Float64)?,
        cast(3, DataType::Float64)?,
        cast(4, DataType::Float64)?,
    );
    let (sig_long, sig_short) = (cast(5, DataType::Boolean)?, cast(6, DataType::Boolean)?);
    let (sl_level, tp_level) = (cast(7, DataType::Float64)?, cast(8, DataType::Float64)?);

    let open_ca = open.f64().map_err(type_err(1))?;
    let high_ca = high.f64().map_err(type_err(2))?;
    let low_ca = low.f64().map_err(type_err(3))?;
    let close_ca = close.f64().map_err(type_err(4))?;
    let long_ca = sig_long.bool().map_err(type_err(5))?;
    let short_ca = sig_short.bool().map_err(type_err(6))?;
    let sl_ca = sl_level.f64().map_err(type_err(7))?;
    let tp_ca = tp_level.f64().map_err(type_err(8))?;

    let price = |ca: &Float64Chunked, row: usize, column: &'static str| {
        ca.get(row)
            .filter(|v| v.is_finite())
            .ok_or_else(|| FeedError::InvalidValue {
                row,
                column,
                value: format!("{:?}", ca.get(row)),
            })
    };

    let mut bars = Vec::with_capacity(df.height());
    for (row, timestamp) in timestamps.into_iter().enumerate() {
        bars.push(Bar {
            timestamp,
            open: price(open_ca, row, "open")?,
            high: price(high_ca, row, "high")?,
            low: price(low_ca, row, "low")?,
            close: price(close_ca, row, "close")?,
            sig_long: long_ca.get(row).unwrap_or(false),
            sig_short: short_ca.get(row).unwrap_or(false),
            sl_level: sl_ca.get(row).filter(|v| !v.is_nan()),
            tp_level: tp_ca.get(row).filter(|v| !v.is_nan()),
        });
    }

    super::warn_on_feed_issues(&bars);
    Ok(bars)
}

fn read_timestamps(col: &Column) -> Result<Vec<NaiveDateTime>, FeedError> {
    let invalid = |row: usize, value: String| FeedError::InvalidValue {
        row,
        column: "timestamp",
        value,
    };

    match col.dtype() {
        DataType::Datetime(unit, tz) => {
            let unit = *unit;
            let zone = tz
                .as_ref()
                .map(|name| {
                    name.as_str().parse::<Tz>().map_err(|e| {
                        FeedError::Parquet(format!("timestamp time zone {name}: {e}"))
                    })
                })
                .transpose()?;
            let raw = col
                .cast(&DataType::Int64)
                .map_err(|e| FeedError::Parquet(format!("timestamp cast: {e}")))?;
            let ca = raw
                .i64()
                .map_err(|e| FeedError::Parquet(format!("timestamp type: {e}")))?;
            ca.into_iter()
                .enumerate()
                .map(|(row, v)| {
                    let v = v.ok_or_else(|| invalid(row, "null".into()))?;
                    let utc = from_epoch(v, unit).ok_or_else(|| invalid(row, v.to_string()))?;
                    Ok(match zone {
                        Some(zone) => utc.with_timezone(&zone).naive_local(),
                        None => utc.naive_utc(),
                    })
                })
                .collect()
        }
        DataType::String => {
            let ca = col
                .str()
                .map_err(|e| FeedError::Parquet(format!("timestamp type: {e}")))?;
            ca.into_iter()
                .enumerate()
                .map(|(row, v)| {
                    let s = v.ok_or_else(|| invalid(row, "null".into()))?;
                    parse_timestamp(s).ok_or_else(|| invalid(row, s.to_string()))
                })
                .collect()
        }
        other => Err(FeedError::Parquet(format!(
            "timestamp column has unsupported type {other:?}"
        ))),
    }
}

fn from_epoch(value: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
    }
}
