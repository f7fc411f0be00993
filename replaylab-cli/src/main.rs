//! ReplayLab CLI — run, compare, and asset listing commands.
//!
//! Commands:
//! - `run` — replay a feed from a TOML backtest file (or a synthetic feed)
//! - `compare` — replay the same feed under every intrabar resolution mode
//! - `assets` — list the built-in instrument table

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use replaylab_core::{AssetRegistry, Bar, ReplayRange, ResolutionMode};
use replaylab_runner::config::{checked_range, parse_range_bound};
use replaylab_runner::runner::{load_feed, synthetic_bars};
use replaylab_runner::{
    compare_modes, init_logging, render_comparison, run_backtest, save_artifacts, BacktestFile,
    BacktestResult, LogConfig,
};

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI — single-position bar replay with a trade ledger"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a feed and print the summary.
    Run {
        /// Path to a TOML backtest file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Inclusive start (YYYY-MM-DD or YYYY-MM-DD HH:MM[:SS]). Overrides [feed].start.
        #[arg(long)]
        start: Option<String>,

        /// Inclusive end. Overrides [feed].end.
        #[arg(long)]
        end: Option<String>,

        /// Resolution mode: optimistic, pessimistic, sequenced_ohlc.
        #[arg(long)]
        mode: Option<String>,

        /// Replay a generated feed instead of [feed].
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for the synthetic feed (requires --synthetic).
        #[arg(long)]
        seed: Option<u64>,

        /// Write artifacts here. Overrides [output].dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Replay under every resolution mode and print a comparison table.
    Compare {
        /// Path to a TOML backtest file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Inclusive start. Overrides [feed].start.
        #[arg(long)]
        start: Option<String>,

        /// Inclusive end. Overrides [feed].end.
        #[arg(long)]
        end: Option<String>,

        /// Compare on a generated feed instead of [feed].
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for the synthetic feed (requires --synthetic).
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List built-in instruments.
    Assets,
}

/// Where the bars come from, after argument checks.
struct FeedChoice {
    synthetic: bool,
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env();
    let log_config = if std::env::var_os("LOG_LEVEL").is_none() {
        log_config.with_default_level("warn")
    } else {
        log_config
    };
    init_logging(&log_config).context("failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            mode,
            synthetic,
            seed,
            output_dir,
        } => run_replay_cmd(config, start, end, mode, synthetic, seed, output_dir),
        Commands::Compare {
            config,
            start,
            end,
            synthetic,
            seed,
        } => run_compare_cmd(config, start, end, synthetic, seed),
        Commands::Assets => run_assets_cmd(),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_replay_cmd(
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    mode: Option<String>,
    synthetic: bool,
    seed: Option<u64>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let choice = check_feed_args(config_path.as_deref(), synthetic, seed)?;
    let mut file = load_file(config_path.as_deref())?;
    let range = resolve_range(&file, start, end)?;
    if let Some(mode) = mode {
        file.run.resolution_mode = ResolutionMode::from_str(&mode)?;
    }

    let bars = load_bars_for(&file, &choice)?;
    tracing::info!(bars = bars.len(), synthetic = choice.synthetic, "replaying");
    let registry = file.registry()?;
    let mut result = run_backtest(&file.run, &registry, &bars, range)?;
    result.synthetic = choice.synthetic;

    print_summary(&result);

    let output_dir = output_dir.or_else(|| file.output_dir().map(Path::to_path_buf));
    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_compare_cmd(
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    synthetic: bool,
    seed: Option<u64>,
) -> Result<()> {
    let choice = check_feed_args(config_path.as_deref(), synthetic, seed)?;
    let file = load_file(config_path.as_deref())?;
    let range = resolve_range(&file, start, end)?;
    let bars = load_bars_for(&file, &choice)?;
    let rows = compare_modes(&file.run, &file.registry()?, &bars, range)?;
    print!("{}", render_comparison(&rows));
    Ok(())
}

fn run_assets_cmd() -> Result<()> {
    let registry = AssetRegistry::builtin();
    println!(
        "{:<6} {:>10} {:>12} {:>14} {:>12} {:>10}",
        "Asset", "Tick", "Tick Value", "Point Value", "Commission", "Slippage"
    );
    println!("{}", "-".repeat(69));
    for (name, spec) in registry.iter() {
        let marker = if name == registry.default_name() { "*" } else { "" };
        println!(
            "{:<6} {:>10} {:>12.2} {:>14.2} {:>12.2} {:>10}",
            format!("{name}{marker}"),
            spec.tick_size,
            spec.tick_value,
            spec.points_full_value,
            spec.commission_round_trip,
            spec.avg_slippage_ticks
        );
    }
    println!();
    println!("* fallback for unknown asset names");
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────

fn check_feed_args(config: Option<&Path>, synthetic: bool, seed: Option<u64>) -> Result<FeedChoice> {
    if seed.is_some() && !synthetic {
        bail!("--seed requires --synthetic");
    }
    if config.is_none() && !synthetic {
        bail!("one of --config or --synthetic is required");
    }
    Ok(FeedChoice { synthetic, seed })
}

/// Read the backtest file, or start from defaults when only `--synthetic` is given.
fn load_file(path: Option<&Path>) -> Result<BacktestFile> {
    match path {
        Some(path) => BacktestFile::from_file(path)
            .with_context(|| format!("failed to load backtest file {}", path.display())),
        None => Ok(BacktestFile::from_toml("")?),
    }
}

/// `[feed]` bounds with `--start` / `--end` layered on top.
fn resolve_range(
    file: &BacktestFile,
    start: Option<String>,
    end: Option<String>,
) -> Result<ReplayRange> {
    let current = file.range()?;
    let start = match start {
        Some(raw) => Some(parse_range_bound("start", &raw, false)?),
        None => current.start,
    };
    let end = match end {
        Some(raw) => Some(parse_range_bound("end", &raw, true)?),
        None => current.end,
    };
    Ok(checked_range(start, end)?)
}

fn load_bars_for(file: &BacktestFile, choice: &FeedChoice) -> Result<Vec<Bar>> {
    if choice.synthetic {
        Ok(synthetic_bars(file, choice.seed))
    } else {
        Ok(load_feed(file)?)
    }
}

fn print_summary(result: &BacktestResult) {
    let m = &result.manifest;
    let s = &result.summary;
    println!();
    println!("=== Replay: {} ({}) ===", m.asset_name, m.config.resolution_mode);
    if result.synthetic {
        println!("  ** SYNTHETIC DATA **");
    }
    println!("  Bars:            {}", m.bar_count);
    println!("  Total Trades:    {}", s.trade_count);
    println!("  Win Rate:        {:.2}%", s.win_rate * 100.0);
    match s.profit_factor {
        Some(pf) => println!("  Profit Factor:   {pf:.2}"),
        None => println!("  Profit Factor:   inf"),
    }
    println!("  Total PnL (R):   {:.2}R", s.total_pnl_r);
    println!("  Total PnL (USD): ${:.2}", s.total_pnl_usd);
    println!("  Avg R:           {:.3}R", s.avg_pnl_r);
    println!("  Max DD (R):      {:.2}R", s.max_drawdown_r);
    if !s.exit_reasons.is_empty() {
        let reasons: Vec<String> = s
            .exit_reasons
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        println!("  Exits:           {}", reasons.join(", "));
    }
    let skipped = result.diagnostics.total_skipped();
    if skipped > 0 {
        println!("  Skipped Signals: {skipped}");
    }
    println!("  Ledger Digest:   {}", m.ledger_digest.short());
    println!();
}
