//! Integration tests for the runner: config file to artifacts on disk.
//!
//! Writes a small GC feed and a backtest file into a temp directory, runs it
//! through the same path the CLI uses, and checks the persisted artifacts.

use std::path::Path;

use replaylab_core::{ExitReason, ResolutionMode};
use replaylab_runner::config::BacktestFile;
use replaylab_runner::{
    compare_modes, load_artifacts, run_from_file, save_artifacts, RunError,
};

/// Two sessions: a long that hits its target on 03-04, a short opened late on
/// 03-04 that is still open at the rollover, and a short on 03-05 whose next
/// bar touches both levels.
const FEED: &str = "\
timestamp,open,high,low,close,sig_long,sig_short,sl_level,tp_level
2024-03-04 09:40:00,2650,2650,2650,2650,true,false,2645.0,2660.0
2024-03-04 09:41:00,2651,2660.5,2649,2658,false,false,,
2024-03-04 15:00:00,2658,2658,2658,2658,false,true,2663.0,2648.0
2024-03-04 15:01:00,2658,2659,2657,2657,false,false,,
2024-03-05 09:40:00,2656,2656,2656,2656,false,false,,
2024-03-05 09:41:00,2650,2650,2650,2650,false,true,2655.0,2640.0
2024-03-05 09:42:00,2650,2656,2639,2645,false,false,,
2024-03-05 09:43:00,2645,2645,2645,2645,false,false,,
";

fn write_fixture(dir: &Path, extra: &str) -> BacktestFile {
    std::fs::write(dir.join("gc.csv"), FEED).unwrap();
    let toml = format!(
        r#"[run]
asset_name = "GC"
risk_usd = 2000.0
trading_windows = [{{ start = "09:30", end = "15:30" }}]
force_close_time = "16:00"
{extra}

[feed]
path = "gc.csv"
"#
    );
    let path = dir.join("backtest.toml");
    std::fs::write(&path, toml).unwrap();
    BacktestFile::from_file(&path).unwrap()
}

#[test]
fn file_run_produces_expected_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_fixture(dir.path(), "");
    let result = run_from_file(&file).unwrap();

    let reasons: Vec<ExitReason> = result.ledger.iter().map(|t| t.reason).collect();
    assert_eq!(
        reasons,
        vec![
            ExitReason::TakeProfit,
            ExitReason::SessionChange,
            ExitReason::TakeProfit,
        ]
    );
    // Rollover close is stamped with the previous session's date.
    let rollover = &result.ledger.trades()[1];
    assert_eq!(rollover.date.to_string(), "2024-03-04");
    assert_eq!(rollover.exit_time.to_string(), "2024-03-05 09:40:00");
    assert_eq!(rollover.exit_price, 2656.0);

    assert_eq!(result.summary.trade_count, 3);
    assert_eq!(result.manifest.bar_count, 8);
    assert!(result.manifest.matches_ledger(&result.ledger));
}

#[test]
fn pessimistic_mode_flips_the_ambiguous_bar() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_fixture(dir.path(), "resolution_mode = \"pessimistic\"");
    let result = run_from_file(&file).unwrap();
    assert_eq!(result.ledger.trades()[2].reason, ExitReason::StopLoss);
}

#[test]
fn feed_range_limits_the_replay() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = write_fixture(dir.path(), "");
    if let Some(feed) = file.feed.as_mut() {
        feed.start = Some("2024-03-05".into());
    }
    let result = run_from_file(&file).unwrap();
    assert_eq!(result.ledger.len(), 1);
    assert_eq!(result.ledger.trades()[0].id.0, 1);
    // The manifest still hashes the full feed.
    assert_eq!(result.manifest.bar_count, 8);
}

#[test]
fn artifacts_roundtrip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_fixture(dir.path(), "");
    let result = run_from_file(&file).unwrap();

    let run_dir = save_artifacts(&result, &dir.path().join("results")).unwrap();
    let saved = load_artifacts(&run_dir).unwrap();
    assert_eq!(saved.ledger, result.ledger);
    assert_eq!(saved.manifest.config_hash, result.manifest.config_hash);

    let csv = std::fs::read_to_string(run_dir.join("trades.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("Session_Change"));
}

#[test]
fn compare_covers_every_mode() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_fixture(dir.path(), "");
    let bars = replaylab_runner::runner::load_feed(&file).unwrap();
    let rows = compare_modes(
        &file.run,
        &file.registry().unwrap(),
        &bars,
        file.range().unwrap(),
    )
    .unwrap();
    assert_eq!(rows.len(), ResolutionMode::ALL.len());
    let optimistic = &rows[0];
    let pessimistic = &rows[1];
    assert_eq!(optimistic.mode, ResolutionMode::Optimistic);
    assert!(optimistic.summary.total_pnl_r > pessimistic.summary.total_pnl_r);
    assert_ne!(optimistic.ledger_digest, pessimistic.ledger_digest);
}

#[test]
fn missing_feed_file_is_a_feed_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_fixture(dir.path(), "");
    std::fs::remove_file(dir.path().join("gc.csv")).unwrap();
    assert!(matches!(run_from_file(&file), Err(RunError::Feed(_))));
}
