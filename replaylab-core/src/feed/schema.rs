//! Bar feed schema: required columns, cell parsing, and loader errors.

use chrono::{DateTime, NaiveDateTime};
use std::path::PathBuf;

/// Columns every feed must carry, in canonical order. Matched case-insensitively.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "sig_long",
    "sig_short",
    "sl_level",
    "tp_level",
];

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid value in column {column} at row {row}: '{value}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Unsupported feed format: {0}")]
    UnsupportedFormat(String),
}

/// Alternate header names accepted for a required column.
const COLUMN_ALIASES: [(&str, &[&str]); 1] = [("timestamp", &["timestamp_ny"])];

/// Position of `name` (or one of its aliases) among `headers`, ignoring ASCII
/// case and surrounding whitespace. The canonical name wins over an alias.
pub(crate) fn find_column<'a>(
    headers: impl IntoIterator<Item = &'a str>,
    name: &str,
) -> Option<usize> {
    let headers: Vec<&str> = headers.into_iter().map(str::trim).collect();
    let aliases = COLUMN_ALIASES
        .iter()
        .find(|(canonical, _)| *canonical == name)
        .map_or(&[][..], |(_, aliases)| *aliases);
    std::iter::once(name)
        .chain(aliases.iter().copied())
        .find_map(|candidate| headers.iter().position(|h| h.eq_ignore_ascii_case(candidate)))
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse a bar timestamp. Offsets (RFC 3339) keep their local wall-clock time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z")
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// `true`/`false`/`1`/`0`, case-insensitive. An empty cell reads as `false`.
pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" => Some(true),
        "false" | "0" | "0.0" | "" => Some(false),
        _ => None,
    }
}

/// Price cell. Must be a finite number.
pub(crate) fn parse_price(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Level cell. Empty and NaN cells are absent; anything else must parse.
pub(crate) fn parse_level(raw: &str) -> Result<Option<f64>, ()> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn timestamp_formats() {
        assert_eq!(parse_timestamp("2024-03-04 09:30:00"), Some(ts(9, 30, 0)));
        assert_eq!(parse_timestamp("2024-03-04 09:30"), Some(ts(9, 30, 0)));
        assert_eq!(parse_timestamp("2024-03-04T09:30:15"), Some(ts(9, 30, 15)));
        assert_eq!(parse_timestamp("2024-03-04T09:30:00-05:00"), Some(ts(9, 30, 0)));
        assert_eq!(parse_timestamp("2024-03-04 09:30:00-05:00"), Some(ts(9, 30, 0)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("False"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("yes"), None);
    }

    #[test]
    fn levels() {
        assert_eq!(parse_level(""), Ok(None));
        assert_eq!(parse_level("NaN"), Ok(None));
        assert_eq!(parse_level(" 2645.5 "), Ok(Some(2645.5)));
        assert!(parse_level("abc").is_err());
    }

    #[test]
    fn column_lookup_ignores_case() {
        let headers = ["Timestamp", "Open", " HIGH "];
        assert_eq!(find_column(headers, "high"), Some(2));
        assert_eq!(find_column(headers, "close"), None);
    }

    #[test]
    fn timestamp_ny_header_is_accepted() {
        let headers = ["Timestamp_NY", "Open", "High"];
        assert_eq!(find_column(headers, "timestamp"), Some(0));
        assert_eq!(find_column(headers, "timestamp_ny"), Some(0));
        // The canonical header wins when both are present.
        let both = ["Timestamp_NY", "timestamp"];
        assert_eq!(find_column(both, "timestamp"), Some(1));
        assert_eq!(find_column(["Open_NY"], "open"), None);
    }
}
