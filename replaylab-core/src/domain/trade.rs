//! CompletedTrade — one closed round trip as recorded in the ledger.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::Side;

/// Ledger identifier. Dense, 1-based, assigned at entry time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    /// Target level touched.
    #[serde(rename = "TP")]
    TakeProfit,
    /// Stop level touched (initial or break-even stop).
    #[serde(rename = "SL")]
    StopLoss,
    /// Time-of-day flatten.
    #[serde(rename = "ForceClose_EOD")]
    ForceCloseEod,
    /// Final bar of the replay window.
    #[serde(rename = "ForceClose_EOS")]
    ForceCloseEos,
    /// Calendar date rolled over while the position was open.
    #[serde(rename = "Session_Change")]
    SessionChange,
}

impl ExitReason {
    pub const ALL: [ExitReason; 5] = [
        Self::TakeProfit,
        Self::StopLoss,
        Self::ForceCloseEod,
        Self::ForceCloseEos,
        Self::SessionChange,
    ];

    /// Ledger label, as consumed by reporting.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TakeProfit => "TP",
            Self::StopLoss => "SL",
            Self::ForceCloseEod => "ForceClose_EOD",
            Self::ForceCloseEos => "ForceClose_EOS",
            Self::SessionChange => "Session_Change",
        }
    }

    /// Whether the exit fill pays the instrument's average slippage.
    ///
    /// Target fills happen at the resting level. Time-of-day and session
    /// closes are administrative, not market-triggered.
    pub fn applies_slippage(self) -> bool {
        match self {
            Self::StopLoss | Self::ForceCloseEos => true,
            Self::TakeProfit | Self::ForceCloseEod | Self::SessionChange => false,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed round trip. Immutable once appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTrade {
    pub id: TradeId,
    /// Session date the trade belonged to (the last-seen date when it closed).
    pub date: NaiveDate,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub side: Side,
    pub quantity: u32,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Net of commission.
    pub pnl_usd: f64,
    /// `pnl_usd` as a multiple of the dollar risk committed at entry.
    pub pnl_r: f64,
    pub reason: ExitReason,
}

impl CompletedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl_r > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl_r < 0.0
    }
}
