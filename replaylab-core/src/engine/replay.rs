//! Bar-by-bar replay loop — the single-position state machine.
//!
//! Three phases per bar:
//! 1. Session boundary: a new calendar date closes any open position at the
//!    bar's close (`Session_Change`) and resets the daily entry counter.
//! 2. Position management: intrabar stop/target resolution, break-even
//!    arming, time-of-day and end-of-series flattening.
//! 3. Entry: signal evaluation when flat, inside a trading window, and under
//!    the daily cap.

use crate::config::{BreakEvenTiming, ConfigError, RunConfig};
use crate::domain::{AssetRegistry, AssetSpec, Bar, CompletedTrade, ExitReason, Position, Side};
use crate::feed::ReplayRange;
use crate::ledger::TradeLedger;

use super::events::{EngineEvent, EventSink, NullSink, SkipReason};
use super::pricing::{plan_entry, settle};
use super::resolver::resolve_exit;
use super::state::RunState;

/// Immutable replay engine: a validated config plus its resolved asset spec.
///
/// `run` takes `&self` and builds all mutable state per call, so one engine can
/// serve many runs, including concurrently from several threads.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    config: RunConfig,
    spec: AssetSpec,
}

impl ReplayEngine {
    /// Validate `config` and resolve its instrument against `registry`.
    ///
    /// Unknown asset names fall back to the registry default; the config keeps
    /// the requested name.
    pub fn new(config: RunConfig, registry: &AssetRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        let spec = *registry.lookup(&config.asset_name);
        Ok(Self { config, spec })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The spec actually used for pricing (after fallback).
    pub fn asset_spec(&self) -> &AssetSpec {
        &self.spec
    }

    /// Replay `bars` restricted to `range` and return the ledger.
    pub fn run(&self, bars: &[Bar], range: ReplayRange) -> TradeLedger {
        self.run_with_sink(bars, range, &mut NullSink)
    }

    /// Same as [`ReplayEngine::run`], reporting every engine event to `sink`.
    pub fn run_with_sink(
        &self,
        bars: &[Bar],
        range: ReplayRange,
        sink: &mut dyn EventSink,
    ) -> TradeLedger {
        let selected = range.select(bars);
        let bars: &[Bar] = &selected;
        let mut state = RunState::new();

        let Some(last_index) = bars.len().checked_sub(1) else {
            tracing::debug!(asset = %self.config.asset_name, "empty replay window");
            return state.into_ledger();
        };

        for (index, bar) in bars.iter().enumerate() {
            let is_last_bar = index == last_index;

            // ─── Phase 1: Session boundary ───
            let date = bar.date();
            if state.is_new_session(date) {
                if let Some(position) = state.position.take() {
                    self.close(&mut state, position, ExitReason::SessionChange, bar, sink);
                }
                state.begin_session(date);
            }

            // ─── Phase 2: Position management ───
            let mut closed_this_bar = false;
            if let Some(mut position) = state.position.take() {
                match self.manage(&mut position, bar, is_last_bar, sink) {
                    Some(reason) => {
                        self.close(&mut state, position, reason, bar, sink);
                        closed_this_bar = true;
                    }
                    None => {
                        state.position = Some(position);
                        continue;
                    }
                }
            }

            // ─── Phase 3: Entry ───
            if closed_this_bar && !self.config.allow_same_bar_reentry {
                continue;
            }
            self.try_enter(&mut state, bar, is_last_bar, sink);
        }

        tracing::debug!(
            asset = %self.config.asset_name,
            bars = bars.len(),
            trades = state.ledger.len(),
            "replay finished"
        );
        state.into_ledger()
    }

    /// Resolve exits and break-even for an open position. Returns the close reason, if any.
    fn manage(
        &self,
        position: &mut Position,
        bar: &Bar,
        is_last_bar: bool,
        sink: &mut dyn EventSink,
    ) -> Option<ExitReason> {
        let resolved = match self.config.break_even_timing {
            BreakEvenTiming::SameBar => {
                self.maybe_arm_break_even(position, bar, sink);
                resolve_exit(position, bar, self.config.resolution_mode)
            }
            BreakEvenTiming::NextBar => {
                // The arming bar resolves against the stop it opened with.
                let resolved = resolve_exit(position, bar, self.config.resolution_mode);
                if resolved.is_none() {
                    self.maybe_arm_break_even(position, bar, sink);
                }
                resolved
            }
        };

        resolved
            .or_else(|| {
                self.config
                    .is_force_close_time(bar.time())
                    .then_some(ExitReason::ForceCloseEod)
            })
            .or_else(|| is_last_bar.then_some(ExitReason::ForceCloseEos))
    }

    fn maybe_arm_break_even(&self, position: &mut Position, bar: &Bar, sink: &mut dyn EventSink) {
        if position.break_even_active {
            return;
        }
        let excursion = position.favorable_excursion(bar.high, bar.low);
        if excursion >= position.risk_points * self.config.be_trigger_r {
            position.arm_break_even(self.config.be_offset_ticks * self.spec.tick_size);
            tracing::debug!(
                id = %position.id,
                stop = position.stop_price,
                at = %bar.timestamp,
                "break-even armed"
            );
            sink.on_event(EngineEvent::BreakEvenArmed {
                id: position.id,
                timestamp: bar.timestamp,
                stop_price: position.stop_price,
            });
        }
    }

    /// Long wins when both signals fire.
    fn signal_side(&self, bar: &Bar) -> Option<Side> {
        let direction = self.config.direction;
        if bar.sig_long && direction.allows(Side::Long) {
            Some(Side::Long)
        } else if bar.sig_short && direction.allows(Side::Short) {
            Some(Side::Short)
        } else {
            None
        }
    }

    fn try_enter(
        &self,
        state: &mut RunState,
        bar: &Bar,
        is_last_bar: bool,
        sink: &mut dyn EventSink,
    ) {
        if !self.config.in_trading_window(bar.time()) {
            return;
        }
        let Some(side) = self.signal_side(bar) else {
            return;
        };

        let mut skip = |reason: SkipReason| {
            tracing::debug!(at = %bar.timestamp, %side, %reason, "entry skipped");
            sink.on_event(EngineEvent::EntrySkipped {
                timestamp: bar.timestamp,
                side,
                reason,
            });
        };

        if let Some(cap) = self.config.trade_cap() {
            if state.day_trades >= cap {
                skip(SkipReason::DailyCapReached { cap });
                return;
            }
        }
        if is_last_bar {
            skip(SkipReason::FinalBar);
            return;
        }

        let plan = match plan_entry(bar, side, &self.spec, self.config.risk_usd) {
            Ok(plan) => plan,
            Err(reason) => {
                skip(reason);
                return;
            }
        };

        let position = Position {
            id: state.ledger.next_id(),
            side: plan.side,
            entry_price: plan.entry_price,
            stop_price: plan.stop_price,
            target_price: plan.target_price,
            quantity: plan.quantity,
            risk_points: plan.risk_points,
            break_even_active: false,
            entry_timestamp: bar.timestamp,
        };

        tracing::info!(
            id = %position.id,
            %side,
            at = %bar.timestamp,
            entry = position.entry_price,
            stop = position.stop_price,
            target = ?position.target_price,
            qty = position.quantity,
            risk_points = position.risk_points,
            "position opened"
        );
        sink.on_event(EngineEvent::Entered {
            id: position.id,
            side,
            timestamp: bar.timestamp,
            entry_price: position.entry_price,
            stop_price: position.stop_price,
            target_price: position.target_price,
            quantity: position.quantity,
            risk_points: position.risk_points,
        });
        state.open(position);
    }

    fn close(
        &self,
        state: &mut RunState,
        position: Position,
        reason: ExitReason,
        bar: &Bar,
        sink: &mut dyn EventSink,
    ) {
        let settlement = settle(&position, reason, bar.close, &self.spec);
        if settlement.zero_risk {
            tracing::error!(
                id = %position.id,
                at = %bar.timestamp,
                risk_points = position.risk_points,
                qty = position.quantity,
                "zero risk at stake on close; pnl_r forced to 0"
            );
            sink.on_event(EngineEvent::InvariantViolation {
                id: position.id,
                timestamp: bar.timestamp,
                detail: format!(
                    "risk at stake is zero (risk_points={}, qty={})",
                    position.risk_points, position.quantity
                ),
            });
        }

        let trade = CompletedTrade {
            id: position.id,
            // Session the trade belonged to; for a rollover close this is the previous date.
            date: state.last_date.unwrap_or_else(|| bar.date()),
            entry_time: position.entry_timestamp,
            exit_time: bar.timestamp,
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price: settlement.exit_price,
            pnl_usd: settlement.pnl_usd,
            pnl_r: settlement.pnl_r,
            reason,
        };

        tracing::info!(
            id = %trade.id,
            reason = %reason,
            at = %bar.timestamp,
            exit = trade.exit_price,
            pnl_usd = trade.pnl_usd,
            pnl_r = trade.pnl_r,
            "position closed"
        );
        sink.on_event(EngineEvent::Exited(trade.clone()));
        state.record(trade);
    }
}
