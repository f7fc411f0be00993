//! Entry sizing and exit settlement.
//!
//! All prices that reach a `Position` are on the instrument's tick grid.
//! Quantities are whole contracts sized from a fixed dollar risk.

use crate::domain::{AssetSpec, Bar, ExitReason, Position, Side};

use super::events::SkipReason;

/// Accepted entry parameters, before an id and timestamp are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPlan {
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: Option<f64>,
    pub risk_points: f64,
    pub quantity: u32,
}

/// Price and size an entry at `bar`'s close, or explain why it cannot be taken.
pub fn plan_entry(
    bar: &Bar,
    side: Side,
    spec: &AssetSpec,
    risk_usd: f64,
) -> Result<EntryPlan, SkipReason> {
    let entry_price = spec.round_to_tick(bar.close + spec.slippage_points() * side.sign());
    let stop_price = spec
        .round_level(bar.sl_level)
        .ok_or(SkipReason::MissingStop)?;
    let target_price = spec.round_level(bar.tp_level);

    let risk_points = (entry_price - stop_price).abs();
    // Also rejects NaN.
    if !(risk_points > 0.0) {
        return Err(SkipReason::NonPositiveRisk { risk_points });
    }

    let risk_per_contract_usd = (risk_points / spec.tick_size) * spec.tick_value;
    let contracts = (risk_usd / risk_per_contract_usd).floor();
    if !(contracts >= 1.0) {
        return Err(SkipReason::QuantityBelowOne {
            risk_per_contract_usd,
        });
    }

    Ok(EntryPlan {
        side,
        entry_price,
        stop_price,
        target_price,
        risk_points,
        // float -> int casts saturate
        quantity: contracts as u32,
    })
}

/// Result of closing a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub exit_price: f64,
    pub pnl_usd: f64,
    pub pnl_r: f64,
    pub risk_usd_at_stake: f64,
    /// Risk at stake was zero and `pnl_r` was forced to 0.
    pub zero_risk: bool,
}

/// Settle `position` for `reason`, with `bar_close` as the fill for non-level exits.
pub fn settle(
    position: &Position,
    reason: ExitReason,
    bar_close: f64,
    spec: &AssetSpec,
) -> Settlement {
    let side = position.side.sign();
    let qty = f64::from(position.quantity);

    let exit_raw = match reason {
        ExitReason::StopLoss => position.stop_price,
        ExitReason::TakeProfit => position.target_price.unwrap_or(bar_close),
        ExitReason::ForceCloseEod | ExitReason::ForceCloseEos | ExitReason::SessionChange => {
            bar_close
        }
    };
    let slippage = if reason.applies_slippage() {
        spec.slippage_points()
    } else {
        0.0
    };
    let exit_price = exit_raw - slippage * side;

    let risk_usd_at_stake = position.risk_points * spec.points_full_value * qty;
    let pnl_usd = (exit_price - position.entry_price) * side * qty * spec.points_full_value
        - qty * spec.comm_per_side() * 2.0;
    let zero_risk = risk_usd_at_stake == 0.0;
    let pnl_r = if zero_risk {
        0.0
    } else {
        pnl_usd / risk_usd_at_stake
    };

    Settlement {
        exit_price,
        pnl_usd,
        pnl_r,
        risk_usd_at_stake,
        zero_risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetRegistry, TradeId};
    use chrono::NaiveDate;

    fn gc() -> AssetSpec {
        *AssetRegistry::builtin().lookup("GC")
    }

    fn signal_bar(close: f64, sl: Option<f64>, tp: Option<f64>) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 45, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            sig_long: true,
            sig_short: false,
            sl_level: sl,
            tp_level: tp,
        }
    }

    fn open_position(plan: &EntryPlan) -> Position {
        Position {
            id: TradeId(1),
            side: plan.side,
            entry_price: plan.entry_price,
            stop_price: plan.stop_price,
            target_price: plan.target_price,
            quantity: plan.quantity,
            risk_points: plan.risk_points,
            break_even_active: false,
            entry_timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 45, 0)
                .unwrap(),
        }
    }

    #[test]
    fn gc_long_sizing() {
        let plan = plan_entry(&signal_bar(2650.0, Some(2645.0), Some(2660.0)), Side::Long, &gc(), 2000.0)
            .unwrap();
        assert!((plan.entry_price - 2650.1).abs() < 1e-9);
        assert!((plan.stop_price - 2645.0).abs() < 1e-9);
        assert!((plan.risk_points - 5.1).abs() < 1e-9);
        assert_eq!(plan.quantity, 3);
        assert_eq!(plan.target_price.map(|t| (t - 2660.0).abs() < 1e-9), Some(true));
    }

    #[test]
    fn short_entry_pays_slippage_downward() {
        let plan = plan_entry(&signal_bar(2650.0, Some(2655.0), None), Side::Short, &gc(), 2000.0)
            .unwrap();
        assert!((plan.entry_price - 2649.9).abs() < 1e-9);
        assert_eq!(plan.target_price, None);
    }

    #[test]
    fn missing_stop_skips() {
        let err = plan_entry(&signal_bar(2650.0, None, Some(2660.0)), Side::Long, &gc(), 2000.0)
            .unwrap_err();
        assert_eq!(err, SkipReason::MissingStop);
    }

    #[test]
    fn zero_risk_skips() {
        // Stop rounds onto the slipped entry price.
        let err = plan_entry(&signal_bar(2650.0, Some(2650.1), None), Side::Long, &gc(), 2000.0)
            .unwrap_err();
        assert!(matches!(err, SkipReason::NonPositiveRisk { .. }));
    }

    #[test]
    fn budget_below_one_contract_skips() {
        let err = plan_entry(&signal_bar(2650.0, Some(2600.0), None), Side::Long, &gc(), 2000.0)
            .unwrap_err();
        match err {
            SkipReason::QuantityBelowOne {
                risk_per_contract_usd,
            } => assert!((risk_per_contract_usd - 5010.0).abs() < 1e-6),
            other => panic!("unexpected skip: {other:?}"),
        }
    }

    #[test]
    fn target_fill_has_no_slippage() {
        let spec = gc();
        let plan = plan_entry(&signal_bar(2650.0, Some(2645.0), Some(2660.0)), Side::Long, &spec, 2000.0)
            .unwrap();
        let s = settle(&open_position(&plan), ExitReason::TakeProfit, 2661.0, &spec);
        assert!((s.exit_price - 2660.0).abs() < 1e-9);
        // (2660.0 - 2650.1) * 3 * 100 - 3 * 6.7 * 2
        assert!((s.pnl_usd - 2929.8).abs() < 1e-6);
        assert!((s.risk_usd_at_stake - 1530.0).abs() < 1e-6);
        assert!((s.pnl_r - 2929.8 / 1530.0).abs() < 1e-9);
        assert!(!s.zero_risk);
    }

    #[test]
    fn stop_fill_pays_slippage_against_the_trade() {
        let spec = gc();
        let plan = plan_entry(&signal_bar(2650.0, Some(2645.0), Some(2660.0)), Side::Long, &spec, 2000.0)
            .unwrap();
        let s = settle(&open_position(&plan), ExitReason::StopLoss, 2640.0, &spec);
        assert!((s.exit_price - 2644.9).abs() < 1e-9);
        // (2644.9 - 2650.1) * 300 - 40.2 = -1560 - 40.2
        assert!((s.pnl_usd + 1600.2).abs() < 1e-6);
    }

    #[test]
    fn administrative_closes_use_bar_close() {
        let spec = gc();
        let plan = plan_entry(&signal_bar(2650.0, Some(2645.0), None), Side::Long, &spec, 2000.0)
            .unwrap();
        let position = open_position(&plan);
        for reason in [ExitReason::ForceCloseEod, ExitReason::SessionChange] {
            let s = settle(&position, reason, 2652.0, &spec);
            assert!((s.exit_price - 2652.0).abs() < 1e-9);
        }
        let eos = settle(&position, ExitReason::ForceCloseEos, 2652.0, &spec);
        assert!((eos.exit_price - 2651.9).abs() < 1e-9);
    }

    #[test]
    fn zero_risk_at_stake_is_guarded() {
        let spec = gc();
        let plan = plan_entry(&signal_bar(2650.0, Some(2645.0), None), Side::Long, &spec, 2000.0)
            .unwrap();
        let mut position = open_position(&plan);
        position.risk_points = 0.0;
        let s = settle(&position, ExitReason::ForceCloseEod, 2652.0, &spec);
        assert!(s.zero_risk);
        assert_eq!(s.pnl_r, 0.0);
    }
}
