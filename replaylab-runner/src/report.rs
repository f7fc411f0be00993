//! Ledger analytics — summary statistics, equity curve, calendar breakdowns.
//!
//! Everything here is a pure function of the completed trades. Trades are
//! ordered by exit time before any cumulative figure is computed.

use chrono::{Datelike, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use replaylab_core::{CompletedTrade, ExitReason, Side};

/// Headline statistics for one ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub trade_count: usize,
    pub winners: usize,
    pub losers: usize,
    /// Fraction of trades with positive R, 0.0 for an empty ledger.
    pub win_rate: f64,
    /// Gross winning R over gross losing R. `None` when nothing lost.
    pub profit_factor: Option<f64>,
    pub total_pnl_r: f64,
    pub total_pnl_usd: f64,
    pub avg_pnl_r: f64,
    /// Deepest peak-to-trough fall of the R equity curve (zero or negative).
    pub max_drawdown_r: f64,
    /// Trade count per exit reason label.
    pub exit_reasons: BTreeMap<String, usize>,
}

impl TradeSummary {
    pub fn compute(trades: &[CompletedTrade]) -> Self {
        let ordered = by_exit_time(trades);
        let trade_count = ordered.len();
        let winners = ordered.iter().filter(|t| t.is_winner()).count();
        let losers = ordered.iter().filter(|t| t.is_loser()).count();
        let total_pnl_r: f64 = ordered.iter().map(|t| t.pnl_r).sum();

        let mut exit_reasons = BTreeMap::new();
        for t in &ordered {
            *exit_reasons.entry(t.reason.as_str().to_string()).or_insert(0) += 1;
        }

        Self {
            trade_count,
            winners,
            losers,
            win_rate: ratio(winners, trade_count),
            profit_factor: profit_factor(&ordered),
            total_pnl_r,
            total_pnl_usd: ordered.iter().map(|t| t.pnl_usd).sum(),
            avg_pnl_r: if trade_count == 0 {
                0.0
            } else {
                total_pnl_r / trade_count as f64
            },
            max_drawdown_r: max_drawdown(ordered.iter().map(|t| t.pnl_r)),
            exit_reasons,
        }
    }

    /// Count for one exit reason (zero when absent).
    pub fn reason_count(&self, reason: ExitReason) -> usize {
        self.exit_reasons.get(reason.as_str()).copied().unwrap_or(0)
    }
}

/// One step of the cumulative R curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub exit_time: NaiveDateTime,
    pub equity_r: f64,
    pub peak_r: f64,
    pub drawdown_r: f64,
}

/// Per calendar year, keyed by the trade's session date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualRow {
    pub year: i32,
    pub trades: usize,
    pub pnl_r: f64,
    pub pnl_usd: f64,
    pub max_drawdown_r: f64,
}

/// Per weekday and side, keyed by the trade's session date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayRow {
    pub weekday: Weekday,
    pub side: Side,
    pub trades: usize,
    pub win_rate: f64,
    pub pnl_r: f64,
    pub pnl_usd: f64,
}

/// Everything the Markdown report renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: TradeSummary,
    pub equity: Vec<EquityPoint>,
    pub annual: Vec<AnnualRow>,
    pub weekday: Vec<WeekdayRow>,
}

impl Report {
    pub fn from_trades(trades: &[CompletedTrade]) -> Self {
        Self {
            summary: TradeSummary::compute(trades),
            equity: equity_curve(trades),
            annual: annual_breakdown(trades),
            weekday: weekday_breakdown(trades),
        }
    }
}

// ─── Curves and breakdowns ──────────────────────────────────────────

/// Cumulative R by exit time. The running peak starts at the first point's equity.
pub fn equity_curve(trades: &[CompletedTrade]) -> Vec<EquityPoint> {
    let mut equity = 0.0;
    let mut peak = f64::NEG_INFINITY;
    by_exit_time(trades)
        .into_iter()
        .map(|t| {
            equity += t.pnl_r;
            peak = peak.max(equity);
            EquityPoint {
                exit_time: t.exit_time,
                equity_r: equity,
                peak_r: peak,
                drawdown_r: equity - peak,
            }
        })
        .collect()
}

/// Calendar-year rows in ascending year order.
pub fn annual_breakdown(trades: &[CompletedTrade]) -> Vec<AnnualRow> {
    let mut years: BTreeMap<i32, Vec<&CompletedTrade>> = BTreeMap::new();
    for t in by_exit_time(trades) {
        years.entry(t.date.year()).or_default().push(t);
    }
    years
        .into_iter()
        .map(|(year, group)| AnnualRow {
            year,
            trades: group.len(),
            pnl_r: group.iter().map(|t| t.pnl_r).sum(),
            pnl_usd: group.iter().map(|t| t.pnl_usd).sum(),
            max_drawdown_r: max_drawdown(group.iter().map(|t| t.pnl_r)),
        })
        .collect()
}

/// Weekday x side rows, Monday first, long before short. Empty cells are omitted.
pub fn weekday_breakdown(trades: &[CompletedTrade]) -> Vec<WeekdayRow> {
    let mut cells: BTreeMap<(u32, u8), Vec<&CompletedTrade>> = BTreeMap::new();
    for t in trades {
        let key = (t.date.weekday().num_days_from_monday(), side_rank(t.side));
        cells.entry(key).or_default().push(t);
    }
    cells
        .into_values()
        .map(|group| {
            let first = group[0];
            let winners = group.iter().filter(|t| t.is_winner()).count();
            WeekdayRow {
                weekday: first.date.weekday(),
                side: first.side,
                trades: group.len(),
                win_rate: ratio(winners, group.len()),
                pnl_r: group.iter().map(|t| t.pnl_r).sum(),
                pnl_usd: group.iter().map(|t| t.pnl_usd).sum(),
            }
        })
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Gross winning R divided by gross losing R.
pub fn profit_factor(trades: &[&CompletedTrade]) -> Option<f64> {
    let gross_win: f64 = trades.iter().filter(|t| t.pnl_r > 0.0).map(|t| t.pnl_r).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl_r < 0.0)
        .map(|t| t.pnl_r)
        .sum::<f64>()
        .abs();
    if gross_loss > 0.0 {
        Some(gross_win / gross_loss)
    } else {
        None
    }
}

/// Deepest drawdown of the cumulative sum of `pnl_r` below its running maximum.
/// The first point is its own peak, so an opening loss is not a drawdown.
pub fn max_drawdown(pnl_r: impl IntoIterator<Item = f64>) -> f64 {
    let mut equity = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for r in pnl_r {
        equity += r;
        peak = peak.max(equity);
        worst = worst.min(equity - peak);
    }
    worst
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Trades sorted by exit time. Ties keep ledger order.
fn by_exit_time(trades: &[CompletedTrade]) -> Vec<&CompletedTrade> {
    let mut ordered: Vec<&CompletedTrade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.exit_time);
    ordered
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn side_rank(side: Side) -> u8 {
    match side {
        Side::Long => 0,
        Side::Short => 1,
    }
}
