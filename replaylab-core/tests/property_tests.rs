//! Property tests for replay invariants.
//!
//! Uses proptest to verify, over random feeds and configurations:
//! 1. Single position — entries and exits strictly alternate
//! 2. Dense ids — ledger ids are exactly 1..=n
//! 3. PnL reconciliation — every trade's USD and R figures follow from its fills
//! 4. Determinism — identical inputs produce identical digests
//! 5. Daily cap — no session takes more entries than the cap
//! 6. Tick rounding — idempotent for every tick size

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use replaylab_core::domain::round_to_tick;
use replaylab_core::{
    AssetRegistry, Bar, BreakEvenTiming, EngineEvent, EventLog, ReplayEngine, ReplayRange,
    ResolutionMode, RunConfig, Side,
};

// ── Strategies (proptest) ────────────────────────────────────────────

#[derive(Debug, Clone)]
struct BarSeed {
    gap_minutes: i64,
    drift: f64,
    up_wick: f64,
    down_wick: f64,
    body: f64,
    sig_long: bool,
    sig_short: bool,
    stop_dist: Option<f64>,
    target_dist: Option<f64>,
}

fn arb_seed() -> impl Strategy<Value = BarSeed> {
    (
        prop_oneof![8 => 1i64..5, 1 => 300i64..1500],
        -8.0..8.0_f64,
        0.0..12.0_f64,
        0.0..12.0_f64,
        -6.0..6.0_f64,
        prop::bool::weighted(0.25),
        prop::bool::weighted(0.25),
        prop::option::weighted(0.9, 0.0..30.0_f64),
        prop::option::weighted(0.8, 1.0..60.0_f64),
    )
        .prop_map(
            |(gap_minutes, drift, up_wick, down_wick, body, sig_long, sig_short, stop_dist, target_dist)| {
                BarSeed {
                    gap_minutes,
                    drift,
                    up_wick,
                    down_wick,
                    body,
                    sig_long,
                    sig_short,
                    stop_dist,
                    target_dist,
                }
            },
        )
}

fn arb_mode() -> impl Strategy<Value = ResolutionMode> {
    prop_oneof![
        Just(ResolutionMode::Optimistic),
        Just(ResolutionMode::Pessimistic),
        Just(ResolutionMode::SequencedOhlc),
    ]
}

fn arb_timing() -> impl Strategy<Value = BreakEvenTiming> {
    prop_oneof![Just(BreakEvenTiming::NextBar), Just(BreakEvenTiming::SameBar)]
}

fn build_bars(seeds: &[BarSeed]) -> Vec<Bar> {
    let mut ts: NaiveDateTime = NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 25, 0)
        .unwrap();
    let mut price = 18_000.0;
    seeds
        .iter()
        .map(|s| {
            ts += Duration::minutes(s.gap_minutes);
            let open = price;
            let close = open + s.body;
            let high = open.max(close) + s.up_wick;
            let low = open.min(close) - s.down_wick;
            price = close + s.drift;
            // Long levels by default; a short-only signal gets mirrored levels.
            let short_only = s.sig_short && !s.sig_long;
            let dir = if short_only { -1.0 } else { 1.0 };
            Bar {
                timestamp: ts,
                open,
                high,
                low,
                close,
                sig_long: s.sig_long,
                sig_short: s.sig_short,
                sl_level: s.stop_dist.map(|d| close - d * dir),
                tp_level: s.target_dist.map(|d| close + d * dir),
            }
        })
        .collect()
}

fn engine(mode: ResolutionMode, timing: BreakEvenTiming, cap: i32, reentry: bool) -> ReplayEngine {
    let config = RunConfig {
        resolution_mode: mode,
        break_even_timing: timing,
        max_trades_per_day: cap,
        allow_same_bar_reentry: reentry,
        risk_usd: 5_000.0,
        ..RunConfig::default()
    };
    ReplayEngine::new(config, &AssetRegistry::builtin()).unwrap()
}

// ── 1–3. Structural invariants ───────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Entries and exits alternate, ids are dense, and every trade reconciles.
    #[test]
    fn ledger_invariants_hold(
        seeds in prop::collection::vec(arb_seed(), 0..200),
        mode in arb_mode(),
        timing in arb_timing(),
        reentry in any::<bool>(),
    ) {
        let bars = build_bars(&seeds);
        let engine = engine(mode, timing, -1, reentry);
        let spec = *engine.asset_spec();
        let mut log = EventLog::new();
        let ledger = engine.run_with_sink(&bars, ReplayRange::full(), &mut log);

        // At most one position: Entered(id) is always followed by Exited(id).
        let mut open: Option<u64> = None;
        for event in log.events() {
            match event {
                EngineEvent::Entered { id, .. } => {
                    prop_assert!(open.is_none(), "entered {} while {:?} open", id, open);
                    open = Some(id.0);
                }
                EngineEvent::Exited(trade) => {
                    prop_assert_eq!(open, Some(trade.id.0));
                    open = None;
                }
                _ => {}
            }
        }
        prop_assert!(open.is_none(), "position left open at end of series");

        for (i, t) in ledger.iter().enumerate() {
            prop_assert_eq!(t.id.0, i as u64 + 1);
            prop_assert!(t.quantity >= 1);
            prop_assert!(t.exit_time >= t.entry_time);

            let side = match t.side { Side::Long => 1.0, Side::Short => -1.0 };
            let qty = f64::from(t.quantity);
            let expected = (t.exit_price - t.entry_price) * side * qty * spec.points_full_value
                - qty * spec.comm_per_side() * 2.0;
            prop_assert!((t.pnl_usd - expected).abs() < 1e-6);

            // Entry prices sit on the tick grid.
            prop_assert!((round_to_tick(t.entry_price, spec.tick_size) - t.entry_price).abs() < 1e-9);
        }
    }

    /// Same feed and config, same ledger, same digest.
    #[test]
    fn replay_is_deterministic(
        seeds in prop::collection::vec(arb_seed(), 1..150),
        mode in arb_mode(),
        timing in arb_timing(),
    ) {
        let bars = build_bars(&seeds);
        let engine = engine(mode, timing, -1, false);
        let a = engine.run(&bars, ReplayRange::full());
        let b = engine.run(&bars, ReplayRange::full());
        prop_assert_eq!(a.digest(), b.digest());
    }

    /// No session takes more entries than the configured cap.
    #[test]
    fn daily_cap_is_never_exceeded(
        seeds in prop::collection::vec(arb_seed(), 1..200),
        cap in 0i32..4,
        mode in arb_mode(),
    ) {
        let bars = build_bars(&seeds);
        let ledger = engine(mode, BreakEvenTiming::NextBar, cap, true)
            .run(&bars, ReplayRange::full());

        let mut per_day = std::collections::BTreeMap::new();
        for t in &ledger {
            *per_day.entry(t.entry_time.date()).or_insert(0i32) += 1;
        }
        for (day, count) in per_day {
            prop_assert!(count <= cap, "{} entries on {}", count, day);
        }
    }
}

// ── 6. Tick rounding ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn tick_rounding_is_idempotent(
        price in 1.0..100_000.0_f64,
        tick in prop_oneof![Just(0.01), Just(0.1), Just(0.25), Just(1.0)],
    ) {
        let once = round_to_tick(price, tick);
        prop_assert_eq!(round_to_tick(once, tick), once);
        prop_assert!((once - price).abs() <= tick / 2.0 + 1e-9);
    }
}
