//! Bar — one timestamped OHLC candle with precomputed entry signals and levels.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// OHLC bar for the replayed instrument.
///
/// Timestamps are exchange-local wall-clock time (normalized upstream). The
/// signal flags and levels are produced by the strategy layer; the engine never
/// infers a missing level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub sig_long: bool,
    pub sig_short: bool,
    /// Raw stop level for an entry on this bar. `None` when the signal layer left it empty.
    pub sl_level: Option<f64>,
    /// Raw target level for an entry on this bar.
    pub tp_level: Option<f64>,
}

impl Bar {
    /// Calendar date of the bar (session key for day rollover and daily caps).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Time of day of the bar.
    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high bounds everything, low bounds everything.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// A bullish (or flat) bar: close at or above open.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}
