//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! A saved run is a directory holding:
//! - `manifest.json` — the `RunManifest` (config, hashes, counts)
//! - `trades.json` — the ledger, exactly as replayed
//! - `trades.csv` — the same trades as a flat tape
//! - `report.md` — the human-readable report
//!
//! Loading re-checks the manifest's ledger digest against `trades.json`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Weekday;
use replaylab_core::fingerprint::MANIFEST_SCHEMA_VERSION;
use replaylab_core::{CompletedTrade, RunManifest, TradeLedger};

use crate::report::{EquityPoint, Report};
use crate::runner::{BacktestResult, SCHEMA_VERSION};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade tape as CSV.
///
/// Columns: id, date, entry_time, exit_time, side, quantity, entry_price,
/// exit_price, pnl_usd, pnl_r, reason
pub fn export_trades_csv(trades: &[CompletedTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "date",
        "entry_time",
        "exit_time",
        "side",
        "quantity",
        "entry_price",
        "exit_price",
        "pnl_usd",
        "pnl_r",
        "reason",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.id.to_string(),
            &t.date.to_string(),
            &t.entry_time.format(TIMESTAMP_FORMAT).to_string(),
            &t.exit_time.format(TIMESTAMP_FORMAT).to_string(),
            t.side.as_str(),
            &t.quantity.to_string(),
            &format!("{:.6}", t.entry_price),
            &format!("{:.6}", t.exit_price),
            &format!("{:.2}", t.pnl_usd),
            &format!("{:.6}", t.pnl_r),
            t.reason.as_str(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the R equity curve with its running peak and drawdown.
pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["exit_time", "equity_r", "peak_r", "drawdown_r"])?;
    for p in curve {
        wtr.write_record([
            &p.exit_time.format(TIMESTAMP_FORMAT).to_string(),
            &format!("{:.4}", p.equity_r),
            &format!("{:.4}", p.peak_r),
            &format!("{:.4}", p.drawdown_r),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// A run read back from disk.
#[derive(Debug, Clone)]
pub struct SavedRun {
    pub manifest: RunManifest,
    pub ledger: TradeLedger,
}

/// Save the artifact set for a single run.
///
/// Creates a fresh directory `{asset}_{config_hash}_{timestamp}/` under
/// `output_dir` (suffixed `_2`, `_3`, ... when that name is taken) containing
/// `manifest.json`, `trades.json`, `trades.csv`, `equity.csv` and `report.md`.
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let base = format!(
        "{}_{}_{}",
        result.manifest.asset_name,
        result.manifest.config_hash.short(),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = create_fresh_dir(output_dir, &base)?;

    // manifest.json
    let manifest = serde_json::to_string_pretty(&result.manifest)
        .context("failed to serialize RunManifest")?;
    write(&run_dir.join("manifest.json"), &manifest)?;

    // trades.json
    let trades = serde_json::to_string_pretty(&result.ledger)
        .context("failed to serialize trade ledger")?;
    write(&run_dir.join("trades.json"), &trades)?;

    // trades.csv
    write(
        &run_dir.join("trades.csv"),
        &export_trades_csv(result.ledger.trades())?,
    )?;

    // equity.csv + report.md
    let report = Report::from_trades(result.ledger.trades());
    write(&run_dir.join("equity.csv"), &export_equity_csv(&report.equity)?)?;
    write(&run_dir.join("report.md"), &generate_report(result))?;

    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a saved run, rejecting unknown manifest versions and tampered ledgers.
pub fn load_artifacts(dir: &Path) -> Result<SavedRun> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest: RunManifest = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;
    if manifest.schema_version > MANIFEST_SCHEMA_VERSION {
        bail!(
            "unsupported manifest schema version {} (max supported: {})",
            manifest.schema_version,
            MANIFEST_SCHEMA_VERSION
        );
    }

    let trades_path = dir.join("trades.json");
    let json = std::fs::read_to_string(&trades_path)
        .with_context(|| format!("failed to read {}", trades_path.display()))?;
    let ledger: TradeLedger = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", trades_path.display()))?;
    if !manifest.matches_ledger(&ledger) {
        bail!(
            "ledger in {} does not match manifest digest {}",
            trades_path.display(),
            manifest.ledger_digest.short()
        );
    }

    Ok(SavedRun { manifest, ledger })
}

fn create_fresh_dir(parent: &Path, base: &str) -> Result<PathBuf> {
    let mut attempt = 1;
    loop {
        let name = if attempt == 1 {
            base.to_string()
        } else {
            format!("{base}_{attempt}")
        };
        let dir = parent.join(name);
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to create artifact dir: {}", dir.display()))
            }
        }
    }
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let report = Report::from_trades(result.ledger.trades());
    let manifest = &result.manifest;
    let config = &manifest.config;
    let mut md = String::with_capacity(4096);

    md.push_str("# Replay Report\n\n");

    // Metadata
    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Asset | {} |\n", manifest.asset_name));
    md.push_str(&format!(
        "| Tick | {} (${} per tick) |\n",
        manifest.asset_spec.tick_size, manifest.asset_spec.tick_value
    ));
    md.push_str(&format!("| Risk per Trade | ${:.2} |\n", config.risk_usd));
    md.push_str(&format!("| Resolution Mode | {} |\n", config.resolution_mode));
    md.push_str(&format!("| Direction | {:?} |\n", config.direction));
    md.push_str(&format!(
        "| Range | {} to {} |\n",
        bound(manifest.range.start),
        bound(manifest.range.end)
    ));
    md.push_str(&format!("| Bars | {} |\n", manifest.bar_count));
    md.push_str(&format!("| Config Hash | `{}` |\n", manifest.config_hash.short()));
    md.push_str(&format!("| Feed Hash | `{}` |\n", manifest.feed_hash.short()));
    md.push_str(&format!(
        "| Ledger Digest | `{}` |\n",
        manifest.ledger_digest.short()
    ));
    if result.synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    // Performance Summary
    let s = &report.summary;
    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", s.trade_count));
    md.push_str(&format!("| Win Rate | {:.2}% |\n", s.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {} |\n", profit_factor(s.profit_factor)));
    md.push_str(&format!("| Total PnL (R) | {:.2}R |\n", s.total_pnl_r));
    md.push_str(&format!("| Total PnL (USD) | ${:.2} |\n", s.total_pnl_usd));
    md.push_str(&format!("| Average R | {:.3}R |\n", s.avg_pnl_r));
    md.push_str(&format!("| Max Drawdown (R) | {:.2}R |\n", s.max_drawdown_r));
    md.push('\n');

    // Exit reasons
    if !s.exit_reasons.is_empty() {
        md.push_str("## Exit Reasons\n\n");
        md.push_str("| Reason | Trades |\n");
        md.push_str("| --- | ---: |\n");
        for (reason, count) in &s.exit_reasons {
            md.push_str(&format!("| {reason} | {count} |\n"));
        }
        md.push('\n');
    }

    // Weekday x side
    if !report.weekday.is_empty() {
        md.push_str("## By Weekday and Side\n\n");
        md.push_str("| Day | Side | Trades | WR% | PnL (R) | PnL (USD) |\n");
        md.push_str("| --- | --- | ---: | ---: | ---: | ---: |\n");
        for row in &report.weekday {
            md.push_str(&format!(
                "| {} | {} | {} | {:.2} | {:.2} | {:.2} |\n",
                weekday_name(row.weekday),
                row.side,
                row.trades,
                row.win_rate * 100.0,
                row.pnl_r,
                row.pnl_usd
            ));
        }
        md.push('\n');
    }

    // Annual
    if !report.annual.is_empty() {
        md.push_str("## Annual\n\n");
        md.push_str("| Year | Trades | PnL (R) | PnL (USD) | MaxDD (R) |\n");
        md.push_str("| --- | ---: | ---: | ---: | ---: |\n");
        for row in &report.annual {
            md.push_str(&format!(
                "| {} | {} | {:.2} | {:.2} | {:.2} |\n",
                row.year, row.trades, row.pnl_r, row.pnl_usd, row.max_drawdown_r
            ));
        }
        md.push('\n');
    }

    // Diagnostics
    let d = &result.diagnostics;
    if d.total_skipped() > 0
        || d.invariant_violations > 0
        || d.unordered_bars > 0
        || d.malformed_bars > 0
    {
        md.push_str("## Diagnostics\n\n");
        for (kind, count) in &d.skipped_entries {
            md.push_str(&format!("- skipped ({kind}): {count}\n"));
        }
        if d.break_even_armed > 0 {
            md.push_str(&format!("- break-even armed: {}\n", d.break_even_armed));
        }
        if d.invariant_violations > 0 {
            md.push_str(&format!(
                "- **zero-risk closes: {}**\n",
                d.invariant_violations
            ));
        }
        if d.unordered_bars > 0 {
            md.push_str(&format!("- out-of-order bars: {}\n", d.unordered_bars));
        }
        if d.malformed_bars > 0 {
            md.push_str(&format!("- malformed OHLC bars: {}\n", d.malformed_bars));
        }
        md.push('\n');
    }

    md
}

// ─── Helpers ────────────────────────────────────────────────────────

fn bound(ts: Option<chrono::NaiveDateTime>) -> String {
    ts.map_or_else(|| "open".to_string(), |t| t.format(TIMESTAMP_FORMAT).to_string())
}

fn profit_factor(pf: Option<f64>) -> String {
    pf.map_or_else(|| "inf".to_string(), |v| format!("{v:.2}"))
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
