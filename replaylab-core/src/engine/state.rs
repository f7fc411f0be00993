//! Per-run mutable state. Created fresh by every call to `run`.

use chrono::NaiveDate;

use crate::domain::{CompletedTrade, Position};
use crate::ledger::TradeLedger;

/// Mutable state that evolves bar-by-bar during a replay.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    /// The single open position, if any.
    pub position: Option<Position>,
    pub ledger: TradeLedger,
    /// Entries taken on `last_date`.
    pub day_trades: u32,
    /// Calendar date of the previous bar; `None` before the first bar.
    pub last_date: Option<NaiveDate>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `date` starts a new session relative to the previous bar.
    pub fn is_new_session(&self, date: NaiveDate) -> bool {
        self.last_date != Some(date)
    }

    /// Enter a new session: reset the daily entry counter.
    pub fn begin_session(&mut self, date: NaiveDate) {
        self.day_trades = 0;
        self.last_date = Some(date);
    }

    pub fn open(&mut self, position: Position) {
        debug_assert!(self.position.is_none(), "second open position");
        self.day_trades += 1;
        self.position = Some(position);
    }

    pub fn record(&mut self, trade: CompletedTrade) {
        self.ledger.push(trade);
    }

    pub fn into_ledger(self) -> TradeLedger {
        self.ledger
    }
}
