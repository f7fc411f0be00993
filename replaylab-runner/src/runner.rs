//! Backtest runner — wires together feed loading, the replay engine, and reporting.
//!
//! Two entry points:
//! - `run_backtest()`: pre-loaded bars, no I/O. Used by comparison and tests.
//! - `run_from_file()`: loads the feed named by a `BacktestFile`, then runs. Used by the CLI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use replaylab_core::feed::{count_malformed, count_unordered};
use replaylab_core::{
    load_bars, AssetRegistry, Bar, EventLog, FeedError, ReplayEngine, ReplayRange,
    RunConfig, RunManifest, SkipReason, TradeLedger,
};

use crate::config::{BacktestFile, ConfigError};
use crate::report::TradeSummary;
use crate::synthetic::synthetic_feed;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("run config error: {0}")]
    RunConfig(#[from] replaylab_core::ConfigError),
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Engine diagnostics gathered from the event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Signals that did not become positions, per skip kind.
    pub skipped_entries: BTreeMap<String, usize>,
    pub break_even_armed: usize,
    pub invariant_violations: usize,
    /// Bars earlier than their predecessor in the loaded feed.
    pub unordered_bars: usize,
    /// Bars whose high/low do not bound their open and close.
    #[serde(default)]
    pub malformed_bars: usize,
}

impl RunDiagnostics {
    pub fn from_events(log: &EventLog, bars: &[Bar]) -> Self {
        let mut skipped_entries = BTreeMap::new();
        for (_, reason) in log.skipped() {
            *skipped_entries.entry(skip_kind(reason).to_string()).or_insert(0) += 1;
        }
        Self {
            skipped_entries,
            break_even_armed: log.break_even_count(),
            invariant_violations: log.violations(),
            unordered_bars: count_unordered(bars),
            malformed_bars: count_malformed(bars),
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_entries.values().sum()
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub manifest: RunManifest,
    pub ledger: TradeLedger,
    pub summary: TradeSummary,
    #[serde(default)]
    pub diagnostics: RunDiagnostics,
    /// Bars came from the synthetic generator.
    #[serde(default)]
    pub synthetic: bool,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run one replay over pre-loaded bars. Does no I/O.
pub fn run_backtest(
    config: &RunConfig,
    registry: &AssetRegistry,
    bars: &[Bar],
    range: ReplayRange,
) -> Result<BacktestResult, RunError> {
    let engine = ReplayEngine::new(config.clone(), registry)?;
    let mut log = EventLog::new();
    let ledger = engine.run_with_sink(bars, range, &mut log);

    let manifest = RunManifest::new(config, *engine.asset_spec(), bars, range, &ledger);
    let summary = TradeSummary::compute(ledger.trades());
    let diagnostics = RunDiagnostics::from_events(&log, bars);

    tracing::info!(
        asset = %config.asset_name,
        mode = %config.resolution_mode,
        bars = bars.len(),
        trades = ledger.len(),
        skipped = diagnostics.total_skipped(),
        pnl_r = summary.total_pnl_r,
        digest = %manifest.ledger_digest.short(),
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        manifest,
        ledger,
        summary,
        diagnostics,
        synthetic: false,
    })
}

/// Load the `[feed]` named by `file` and run it.
pub fn run_from_file(file: &BacktestFile) -> Result<BacktestResult, RunError> {
    let bars = load_feed(file)?;
    let registry = file.registry()?;
    run_backtest(&file.run, &registry, &bars, file.range()?)
}

/// Run over a generated feed. The file's `[synthetic]` section is used when present.
pub fn run_synthetic(file: &BacktestFile, seed: Option<u64>) -> Result<BacktestResult, RunError> {
    let bars = synthetic_bars(file, seed);
    let registry = file.registry()?;
    let mut result = run_backtest(&file.run, &registry, &bars, file.range()?)?;
    result.synthetic = true;
    Ok(result)
}

/// Bars from the file's `[feed]` section.
pub fn load_feed(file: &BacktestFile) -> Result<Vec<Bar>, RunError> {
    let feed = file.feed()?;
    let bars = load_bars(&feed.path, feed.format)?;
    tracing::info!(path = %feed.path.display(), bars = bars.len(), "feed loaded");
    Ok(bars)
}

/// Bars from the file's `[synthetic]` section (or defaults), with an optional seed override.
pub fn synthetic_bars(file: &BacktestFile, seed: Option<u64>) -> Vec<Bar> {
    let mut spec = file.synthetic.clone().unwrap_or_default();
    if let Some(seed) = seed {
        spec = spec.with_seed(seed);
    }
    synthetic_feed(&spec)
}

/// Stable label for a skip reason, without its payload.
pub fn skip_kind(reason: &SkipReason) -> &'static str {
    match reason {
        SkipReason::MissingStop => "missing_stop",
        SkipReason::NonPositiveRisk { .. } => "non_positive_risk",
        SkipReason::QuantityBelowOne { .. } => "quantity_below_one",
        SkipReason::DailyCapReached { .. } => "daily_cap_reached",
        SkipReason::FinalBar => "final_bar",
    }
}
