//! Candle feed — loading bars from disk and selecting the replay window.
//!
//! Loaders validate the schema before reading any row and never reorder the
//! feed; out-of-order timestamps are reported, not fixed.

pub mod csv_file;
pub mod parquet_file;
pub mod range;
pub mod schema;

pub use csv_file::{load_csv, read_csv};
pub use parquet_file::{dataframe_to_bars, load_parquet};
pub use range::ReplayRange;
pub use schema::{parse_timestamp, FeedError, REQUIRED_COLUMNS};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::Bar;

/// On-disk feed encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Csv,
    Parquet,
}

impl FeedFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, FeedError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") | Some("pq") => Ok(Self::Parquet),
            other => Err(FeedError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Load a feed, using `format` when given and the extension otherwise.
pub fn load_bars(path: &Path, format: Option<FeedFormat>) -> Result<Vec<Bar>, FeedError> {
    let format = match format {
        Some(f) => f,
        None => FeedFormat::from_path(path)?,
    };
    match format {
        FeedFormat::Csv => load_csv(path),
        FeedFormat::Parquet => load_parquet(path),
    }
}

/// Number of bars whose timestamp is earlier than the bar before it.
pub fn count_unordered(bars: &[Bar]) -> usize {
    bars.windows(2)
        .filter(|w| w[1].timestamp < w[0].timestamp)
        .count()
}

/// Number of bars whose OHLC values are inconsistent (high below low, open or
/// close outside the range).
pub fn count_malformed(bars: &[Bar]) -> usize {
    bars.iter().filter(|b| !b.is_sane()).count()
}

/// Log ordering and OHLC problems in a freshly loaded feed. Bars are kept as read.
pub(crate) fn warn_on_feed_issues(bars: &[Bar]) {
    let unordered = count_unordered(bars);
    if unordered > 0 {
        tracing::warn!(
            unordered,
            bars = bars.len(),
            "feed is not sorted by timestamp; replaying in file order"
        );
    }
    if let Some(first) = bars.iter().find(|b| !b.is_sane()) {
        tracing::warn!(
            malformed = count_malformed(bars),
            first = %first.timestamp,
            "feed has bars with inconsistent OHLC"
        );
    }
}
