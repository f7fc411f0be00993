//! Run configuration — immutable parameters for one replay.
//!
//! Serializable so it can live in a TOML backtest file and be hashed into the
//! run manifest. Call [`RunConfig::validate`] before handing it to the engine
//! ([`crate::ReplayEngine::new`] does this for you).

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::Side;

/// Which entry signals the engine may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[serde(alias = "Long")]
    Long,
    #[serde(alias = "Short")]
    Short,
    #[serde(alias = "Both")]
    Both,
}

impl Direction {
    pub fn allows(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Self::Both, _) | (Self::Long, Side::Long) | (Self::Short, Side::Short)
        )
    }
}

/// Intrabar tie-break policy when a bar's range spans both stop and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Target checked before stop.
    #[serde(alias = "Optimistic")]
    Optimistic,
    /// Stop checked before target.
    #[serde(alias = "Pessimistic")]
    Pessimistic,
    /// Path inferred from the bar's own open/close relationship.
    #[serde(alias = "SequencedOHLC", alias = "sequenced")]
    SequencedOhlc,
}

impl ResolutionMode {
    pub const ALL: [ResolutionMode; 3] = [Self::Optimistic, Self::Pessimistic, Self::SequencedOhlc];

    pub fn name(self) -> &'static str {
        match self {
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
            Self::SequencedOhlc => "sequenced_ohlc",
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResolutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "pessimistic" => Ok(Self::Pessimistic),
            "sequenced_ohlc" | "sequencedohlc" | "sequenced" => Ok(Self::SequencedOhlc),
            _ => Err(ConfigError::UnknownResolutionMode(s.to_string())),
        }
    }
}

/// When a break-even adjustment armed on a bar starts to matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakEvenTiming {
    /// The moved stop applies from the following bar; the arming bar resolves
    /// against the stop it opened with.
    #[default]
    NextBar,
    /// The stop moves before the arming bar's own exit resolution.
    SameBar,
}

/// Inclusive time-of-day range in which entries are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TradingWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `"HH:MM"` / `"HH:MM:SS"` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(hhmm::parse(start)?, hhmm::parse(end)?))
    }

    /// Both bounds inclusive. The bar time is compared at minute resolution.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let minute = truncate_to_minute(time);
        self.start <= minute && minute <= self.end
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Immutable parameters for a single replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Instrument key into the asset registry. Unknown names fall back to the default spec.
    pub asset_name: String,
    /// Dollar risk budget per trade.
    pub risk_usd: f64,
    /// Reward multiple used upstream to place targets. The engine uses levels as given.
    pub reward_ratio: f64,
    /// Favorable excursion, in multiples of initial risk, that arms break-even.
    pub be_trigger_r: f64,
    /// Stop offset from entry once break-even is armed, in ticks.
    pub be_offset_ticks: f64,
    /// `-1` for unlimited, otherwise the maximum entries per calendar date.
    pub max_trades_per_day: i32,
    /// Entries are only evaluated inside one of these windows. Empty admits every bar.
    pub trading_windows: Vec<TradingWindow>,
    /// Time of day at or after which an open position is flattened.
    #[serde(with = "hhmm")]
    pub force_close_time: NaiveTime,
    pub direction: Direction,
    pub resolution_mode: ResolutionMode,
    pub break_even_timing: BreakEvenTiming,
    /// Whether a bar that closed a position may open a new one at its close.
    pub allow_same_bar_reentry: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            asset_name: crate::domain::DEFAULT_ASSET.to_string(),
            risk_usd: 2000.0,
            reward_ratio: 2.0,
            be_trigger_r: 1.0,
            be_offset_ticks: 0.0,
            max_trades_per_day: -1,
            trading_windows: vec![TradingWindow::new(
                NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
                NaiveTime::from_hms_opt(15, 55, 0).unwrap_or(NaiveTime::MIN),
            )],
            force_close_time: NaiveTime::from_hms_opt(15, 56, 0).unwrap_or(NaiveTime::MIN),
            direction: Direction::Both,
            resolution_mode: ResolutionMode::Optimistic,
            break_even_timing: BreakEvenTiming::NextBar,
            allow_same_bar_reentry: false,
        }
    }
}

impl RunConfig {
    /// Config for `asset_name` with every other field at its default.
    pub fn for_asset(asset_name: impl Into<String>) -> Self {
        Self {
            asset_name: asset_name.into(),
            ..Self::default()
        }
    }

    /// Check value ranges. Invalid configs never reach the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.risk_usd > 0.0 && self.risk_usd.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "risk_usd",
                reason: format!("must be positive, got {}", self.risk_usd),
            });
        }
        if !(self.reward_ratio >= 0.0 && self.reward_ratio.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "reward_ratio",
                reason: format!("must be non-negative, got {}", self.reward_ratio),
            });
        }
        if !(self.be_trigger_r >= 0.0 && self.be_trigger_r.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "be_trigger_r",
                reason: format!("must be non-negative, got {}", self.be_trigger_r),
            });
        }
        if !self.be_offset_ticks.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "be_offset_ticks",
                reason: "must be finite".into(),
            });
        }
        if self.max_trades_per_day < -1 {
            return Err(ConfigError::InvalidValue {
                field: "max_trades_per_day",
                reason: format!("must be -1 (unlimited) or >= 0, got {}", self.max_trades_per_day),
            });
        }
        for (index, window) in self.trading_windows.iter().enumerate() {
            if window.start > window.end {
                return Err(ConfigError::InvertedWindow {
                    index,
                    start: window.start,
                    end: window.end,
                });
            }
        }
        Ok(())
    }

    /// Daily entry cap, or `None` when unlimited.
    pub fn trade_cap(&self) -> Option<u32> {
        u32::try_from(self.max_trades_per_day).ok()
    }

    /// Whether `time` falls inside any trading window (or no windows are configured).
    pub fn in_trading_window(&self, time: NaiveTime) -> bool {
        self.trading_windows.is_empty() || self.trading_windows.iter().any(|w| w.contains(time))
    }

    /// Whether `time` is at or past the flatten time.
    pub fn is_force_close_time(&self, time: NaiveTime) -> bool {
        time >= self.force_close_time
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("trading window #{index} is inverted: {start} > {end}")]
    InvertedWindow {
        index: usize,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("invalid time-of-day '{0}' (expected HH:MM or HH:MM:SS)")]
    InvalidTime(String),

    #[error("unknown resolution mode '{0}' (expected optimistic, pessimistic or sequenced_ohlc)")]
    UnknownResolutionMode(String),
}

/// Serde helpers for time-of-day fields written as `"HH:MM"` or `"HH:MM:SS"`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ConfigError;

    pub fn parse(s: &str) -> Result<NaiveTime, ConfigError> {
        let trimmed = s.trim();
        NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
            .map_err(|_| ConfigError::InvalidTime(s.to_string()))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}
