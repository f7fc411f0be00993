//! ReplayLab Runner — backtest orchestration, reporting, artifacts.
//!
//! This crate builds on `replaylab-core` to provide:
//! - TOML backtest files (run settings, feed, output, extra assets)
//! - Single-run orchestration with diagnostics and a run manifest
//! - Ledger analytics: summary, R equity curve, annual and weekday breakdowns
//! - JSON / CSV / Markdown artifacts
//! - Parallel resolution-mode comparison
//! - Deterministic synthetic feeds
//! - Logging setup

pub mod compare;
pub mod config;
pub mod export;
pub mod logging;
pub mod report;
pub mod runner;
pub mod synthetic;

pub use compare::{compare_modes, render_comparison, ModeComparison};
pub use config::{BacktestFile, ConfigError};
pub use export::{generate_report, load_artifacts, save_artifacts, SavedRun};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use report::{Report, TradeSummary};
pub use runner::{run_backtest, run_from_file, run_synthetic, BacktestResult, RunDiagnostics, RunError};
pub use synthetic::{synthetic_feed, SyntheticSpec};
