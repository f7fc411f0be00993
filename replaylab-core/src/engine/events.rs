//! Engine diagnostics — everything observable about a run besides the ledger.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{CompletedTrade, Side, TradeId};

/// Why a signal did not become a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The bar carried no stop level.
    MissingStop,
    /// Entry and rounded stop coincide (or the distance is not a number).
    NonPositiveRisk { risk_points: f64 },
    /// One contract already risks more than the dollar budget.
    QuantityBelowOne { risk_per_contract_usd: f64 },
    /// The day's entry cap is used up.
    DailyCapReached { cap: u32 },
    /// The signal fired on the last bar of the replay window, with no bar left to exit on.
    FinalBar,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStop => write!(f, "missing stop level"),
            Self::NonPositiveRisk { risk_points } => write!(f, "non-positive risk ({risk_points})"),
            Self::QuantityBelowOne {
                risk_per_contract_usd,
            } => write!(f, "one contract risks ${risk_per_contract_usd:.2}"),
            Self::DailyCapReached { cap } => write!(f, "daily cap of {cap} reached"),
            Self::FinalBar => write!(f, "signal on final bar"),
        }
    }
}

/// One engine event, emitted in bar order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Entered {
        id: TradeId,
        side: Side,
        timestamp: NaiveDateTime,
        entry_price: f64,
        stop_price: f64,
        target_price: Option<f64>,
        quantity: u32,
        risk_points: f64,
    },
    BreakEvenArmed {
        id: TradeId,
        timestamp: NaiveDateTime,
        stop_price: f64,
    },
    Exited(CompletedTrade),
    EntrySkipped {
        timestamp: NaiveDateTime,
        side: Side,
        reason: SkipReason,
    },
    /// A close produced zero risk-at-stake; `pnl_r` was forced to zero.
    InvariantViolation {
        id: TradeId,
        timestamp: NaiveDateTime,
        detail: String,
    },
}

/// Receiver for engine events.
pub trait EventSink {
    fn on_event(&mut self, event: EngineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: EngineEvent) {}
}

/// Collects events in memory.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<EngineEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<EngineEvent> {
        self.events
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&NaiveDateTime, &SkipReason)> {
        self.events.iter().filter_map(|e| match e {
            EngineEvent::EntrySkipped {
                timestamp, reason, ..
            } => Some((timestamp, reason)),
            _ => None,
        })
    }

    pub fn break_even_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, EngineEvent::BreakEvenArmed { .. }))
            .count()
    }

    pub fn violations(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, EngineEvent::InvariantViolation { .. }))
            .count()
    }
}

impl EventSink for EventLog {
    fn on_event(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn log_filters_by_kind() {
        let mut log = EventLog::new();
        log.on_event(EngineEvent::EntrySkipped {
            timestamp: ts(),
            side: Side::Long,
            reason: SkipReason::MissingStop,
        });
        log.on_event(EngineEvent::BreakEvenArmed {
            id: TradeId(1),
            timestamp: ts(),
            stop_price: 100.0,
        });
        assert_eq!(log.events().len(), 2);
        assert_eq!(log.skipped().count(), 1);
        assert_eq!(log.break_even_count(), 1);
        assert_eq!(log.violations(), 0);
    }

    #[test]
    fn skip_reason_display() {
        let r = SkipReason::QuantityBelowOne {
            risk_per_contract_usd: 2500.0,
        };
        assert_eq!(r.to_string(), "one contract risks $2500.00");
    }
}
