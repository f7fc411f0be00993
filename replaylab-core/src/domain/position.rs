//! Position — the single open trade owned by a replay run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::trade::TradeId;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "Long",
            Self::Short => "Short",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open position. At most one exists per run.
///
/// Prices are tick-rounded at entry. Only the break-even adjustment mutates it
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: TradeId,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    /// `None` when the signal carried no target level; such a target never triggers.
    pub target_price: Option<f64>,
    pub quantity: u32,
    /// Distance between entry and initial stop, in price units. Always > 0.
    pub risk_points: f64,
    pub break_even_active: bool,
    pub entry_timestamp: NaiveDateTime,
}

impl Position {
    /// Favorable excursion reached within a bar with the given extremes.
    pub fn favorable_excursion(&self, high: f64, low: f64) -> f64 {
        match self.side {
            Side::Long => high - self.entry_price,
            Side::Short => self.entry_price - low,
        }
    }

    /// Arm break-even: move the stop to entry plus `offset_points` in the trade's favor.
    pub fn arm_break_even(&mut self, offset_points: f64) {
        self.break_even_active = true;
        self.stop_price = self.entry_price + offset_points * self.side.sign();
    }
}
