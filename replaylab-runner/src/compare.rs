//! Resolution-mode comparison — the same feed replayed under every intrabar policy.
//!
//! Runs are independent and share the immutable bar slice, so they fan out
//! across the rayon pool. Output order follows `ResolutionMode::ALL`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use replaylab_core::{
    AssetRegistry, Bar, Digest, ReplayEngine, ReplayRange, ResolutionMode, RunConfig,
};

use crate::report::TradeSummary;
use crate::runner::RunError;

/// Outcome of one resolution mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeComparison {
    pub mode: ResolutionMode,
    pub summary: TradeSummary,
    pub ledger_digest: Digest,
}

/// Replay `bars` once per resolution mode, in parallel.
pub fn compare_modes(
    config: &RunConfig,
    registry: &AssetRegistry,
    bars: &[Bar],
    range: ReplayRange,
) -> Result<Vec<ModeComparison>, RunError> {
    config.validate()?;
    let selected = range.select(bars);
    let selected: &[Bar] = &selected;

    let comparisons = ResolutionMode::ALL[..]
        .par_iter()
        .map(|&mode| -> Result<ModeComparison, RunError> {
            let config = RunConfig {
                resolution_mode: mode,
                ..config.clone()
            };
            let engine = ReplayEngine::new(config, registry)?;
            let ledger = engine.run(selected, ReplayRange::full());
            Ok(ModeComparison {
                mode,
                summary: TradeSummary::compute(ledger.trades()),
                ledger_digest: ledger.digest(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        modes = comparisons.len(),
        bars = selected.len(),
        "resolution modes compared"
    );
    Ok(comparisons)
}

/// Markdown table, one row per mode.
pub fn render_comparison(rows: &[ModeComparison]) -> String {
    let mut md = String::with_capacity(512);
    md.push_str("# Resolution Mode Comparison\n\n");
    md.push_str("| Mode | Trades | Win Rate | Profit Factor | PnL (R) | PnL (USD) | Max DD (R) | Digest |\n");
    md.push_str("| --- | ---: | ---: | ---: | ---: | ---: | ---: | --- |\n");
    for row in rows {
        let s = &row.summary;
        md.push_str(&format!(
            "| {} | {} | {:.1}% | {} | {:.2} | {:.2} | {:.2} | `{}` |\n",
            row.mode,
            s.trade_count,
            s.win_rate * 100.0,
            s.profit_factor
                .map_or_else(|| "n/a".to_string(), |pf| format!("{pf:.2}")),
            s.total_pnl_r,
            s.total_pnl_usd,
            s.max_drawdown_r,
            row.ledger_digest.short(),
        ));
    }
    md
}
