//! TOML backtest file: run settings, feed location, output, extra assets.
//!
//! ```toml
//! [run]
//! asset_name = "GC"
//! risk_usd = 2000.0
//! trading_windows = [{ start = "08:00", end = "12:00" }]
//!
//! [feed]
//! path = "gc_1m.parquet"
//! start = "2024-01-01"
//! end = "2024-12-31"
//!
//! [output]
//! dir = "results"
//!
//! [assets.MGC]
//! tick_size = 0.1
//! tick_value = 1.0
//! points_full_value = 10.0
//! commission_round_trip = 1.24
//! avg_slippage_ticks = 1.0
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use replaylab_core::feed::parse_timestamp;
use replaylab_core::{AssetError, AssetRegistry, AssetSpec, FeedFormat, ReplayRange, RunConfig};

use crate::synthetic::SyntheticSpec;

/// Errors while reading or validating a backtest file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("[run]: {0}")]
    Run(#[from] replaylab_core::ConfigError),
    #[error("[assets.{name}]: {source}")]
    Asset {
        name: String,
        #[source]
        source: AssetError,
    },
    #[error("invalid {field} timestamp '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("range start {start} is after end {end}")]
    InvertedRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("no [feed] section and no synthetic feed requested")]
    MissingFeed,
}

/// Where the bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSection {
    pub path: PathBuf,
    /// Overrides extension-based detection.
    #[serde(default)]
    pub format: Option<FeedFormat>,
    /// Inclusive lower bound. A bare date means midnight.
    #[serde(default)]
    pub start: Option<String>,
    /// Inclusive upper bound. A bare date means the end of that day.
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    pub dir: PathBuf,
}

/// A complete backtest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestFile {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub feed: Option<FeedSection>,
    #[serde(default)]
    pub output: Option<OutputSection>,
    /// Generator settings for `--synthetic` runs.
    #[serde(default)]
    pub synthetic: Option<SyntheticSpec>,
    /// Instruments added to (or replacing entries of) the built-in table.
    #[serde(default)]
    pub assets: BTreeMap<String, AssetSpec>,
}

impl BacktestFile {
    /// Parse and validate. Relative feed paths stay as written.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: BacktestFile = toml::from_str(content)?;
        file.validate()?;
        Ok(file)
    }

    /// Read a file from disk. A relative feed path resolves against the
    /// directory holding the config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut file = Self::from_toml(&content)?;
        if let (Some(feed), Some(base)) = (file.feed.as_mut(), path.parent()) {
            if feed.path.is_relative() {
                feed.path = base.join(&feed.path);
            }
        }
        Ok(file)
    }

    /// Run settings, asset tables and range bounds must all be usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        for (name, spec) in &self.assets {
            spec.validate().map_err(|source| ConfigError::Asset {
                name: name.clone(),
                source,
            })?;
        }
        self.range()?;
        Ok(())
    }

    /// Built-in instruments plus every `[assets.*]` table.
    pub fn registry(&self) -> Result<AssetRegistry, ConfigError> {
        let mut registry = AssetRegistry::builtin();
        for (name, spec) in &self.assets {
            registry
                .register(name.clone(), *spec)
                .map_err(|source| ConfigError::Asset {
                    name: name.clone(),
                    source,
                })?;
        }
        Ok(registry)
    }

    /// The `[feed]` bounds as a replay range. No feed section means no bounds.
    pub fn range(&self) -> Result<ReplayRange, ConfigError> {
        let Some(feed) = &self.feed else {
            return Ok(ReplayRange::full());
        };
        let start = feed
            .start
            .as_deref()
            .map(|raw| parse_range_bound("start", raw, false))
            .transpose()?;
        let end = feed
            .end
            .as_deref()
            .map(|raw| parse_range_bound("end", raw, true))
            .transpose()?;
        checked_range(start, end)
    }

    pub fn feed(&self) -> Result<&FeedSection, ConfigError> {
        self.feed.as_ref().ok_or(ConfigError::MissingFeed)
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output.as_ref().map(|o| o.dir.as_path())
    }
}

/// Parse a range bound. Full timestamps go through the feed parser; a bare
/// `YYYY-MM-DD` expands to the start of the day, or to its last representable
/// instant when `is_end` is set, so sub-second bars late in the day stay inside.
pub fn parse_range_bound(
    field: &'static str,
    raw: &str,
    is_end: bool,
) -> Result<NaiveDateTime, ConfigError> {
    if let Some(ts) = parse_timestamp(raw) {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ConfigError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        }
    })?;
    let time = if is_end {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    time.map(|t| date.and_time(t))
        .ok_or(ConfigError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}

/// Build a range, rejecting `start > end`.
pub fn checked_range(
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Result<ReplayRange, ConfigError> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(ConfigError::InvertedRange { start: s, end: e });
        }
    }
    Ok(ReplayRange::new(start, end))
}
