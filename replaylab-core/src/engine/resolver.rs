//! Intrabar exit resolution — which of stop and target a bar touched first.
//!
//! A bar only reports its extremes, so when the range spans both levels the
//! order of touches is a policy choice. Every mode is a pure function of the
//! position and the bar, so results are reproducible bit for bit.

use crate::config::ResolutionMode;
use crate::domain::{Bar, ExitReason, Position, Side};

/// Resolve the exit triggered by `bar`, if any. Only `TakeProfit` or `StopLoss` are returned.
pub fn resolve_exit(position: &Position, bar: &Bar, mode: ResolutionMode) -> Option<ExitReason> {
    let touches = Touches::new(position, bar);
    match mode {
        ResolutionMode::Optimistic => touches.target_then_stop(),
        ResolutionMode::Pessimistic => touches.stop_then_target(),
        ResolutionMode::SequencedOhlc => touches.sequenced(position, bar),
    }
}

/// Which levels the bar's extremes reached.
struct Touches {
    target: bool,
    stop: bool,
}

impl Touches {
    fn new(position: &Position, bar: &Bar) -> Self {
        Self {
            target: target_reached(position, bar.high, bar.low),
            stop: stop_reached(position, bar.high, bar.low),
        }
    }

    fn target_then_stop(&self) -> Option<ExitReason> {
        if self.target {
            Some(ExitReason::TakeProfit)
        } else if self.stop {
            Some(ExitReason::StopLoss)
        } else {
            None
        }
    }

    fn stop_then_target(&self) -> Option<ExitReason> {
        if self.stop {
            Some(ExitReason::StopLoss)
        } else if self.target {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    /// Open first (gap-through, stop wins ties), then the inferred path.
    ///
    /// Bullish bars go open → low → high → close; bearish bars go open → high → low → close.
    fn sequenced(&self, position: &Position, bar: &Bar) -> Option<ExitReason> {
        if stop_reached(position, bar.open, bar.open) {
            return Some(ExitReason::StopLoss);
        }
        if target_reached(position, bar.open, bar.open) {
            return Some(ExitReason::TakeProfit);
        }

        // Long stops and short targets sit below the open; the rest above.
        let (below, above) = match position.side {
            Side::Long => (
                self.stop.then_some(ExitReason::StopLoss),
                self.target.then_some(ExitReason::TakeProfit),
            ),
            Side::Short => (
                self.target.then_some(ExitReason::TakeProfit),
                self.stop.then_some(ExitReason::StopLoss),
            ),
        };
        if bar.is_bullish() {
            below.or(above)
        } else {
            above.or(below)
        }
    }
}

fn target_reached(position: &Position, high: f64, low: f64) -> bool {
    match (position.target_price, position.side) {
        (None, _) => false,
        (Some(target), Side::Long) => high >= target,
        (Some(target), Side::Short) => low <= target,
    }
}

fn stop_reached(position: &Position, high: f64, low: f64) -> bool {
    match position.side {
        Side::Long => low <= position.stop_price,
        Side::Short => high >= position.stop_price,
    }
}
