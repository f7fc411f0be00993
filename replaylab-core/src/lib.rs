//! ReplayLab Core — asset registry, run configuration, replay engine, trade ledger.
//!
//! This crate contains the heart of the replay engine:
//! - Domain types (bars, asset specs, positions, completed trades)
//! - Run configuration with validation
//! - Single-position bar-by-bar state machine with configurable intrabar resolution
//! - Append-only trade ledger with content digest
//! - Feed loaders (CSV, Parquet) with fail-fast schema checks
//! - Run fingerprinting

pub mod config;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod fingerprint;
pub mod ledger;

pub use config::{BreakEvenTiming, ConfigError, Direction, ResolutionMode, RunConfig, TradingWindow};
pub use domain::{
    AssetError, AssetRegistry, AssetSpec, Bar, CompletedTrade, ExitReason, Position, Side, TradeId,
};
pub use engine::{
    EngineEvent, EventLog, EventSink, NullSink, ReplayEngine, ReplayRange, SkipReason,
};
pub use feed::{load_bars, FeedError, FeedFormat};
pub use fingerprint::{Digest, RunManifest};
pub use ledger::TradeLedger;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine inputs and outputs are Send + Sync, so
    /// independent runs can be fanned out across threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<AssetSpec>();
        require_sync::<AssetSpec>();
        require_send::<AssetRegistry>();
        require_sync::<AssetRegistry>();
        require_send::<RunConfig>();
        require_sync::<RunConfig>();
        require_send::<Position>();
        require_sync::<Position>();
        require_send::<CompletedTrade>();
        require_sync::<CompletedTrade>();
        require_send::<TradeLedger>();
        require_sync::<TradeLedger>();
        require_send::<ReplayEngine>();
        require_sync::<ReplayEngine>();
        require_send::<EngineEvent>();
        require_sync::<EngineEvent>();
        require_send::<fingerprint::RunManifest>();
        require_sync::<fingerprint::RunManifest>();
    }

    /// The engine's run method borrows `&self`: per-run state never lives on
    /// the engine, so one engine can serve concurrent runs.
    #[test]
    fn run_takes_shared_engine_reference() {
        fn _check(engine: &ReplayEngine, bars: &[Bar]) -> TradeLedger {
            engine.run(bars, ReplayRange::full())
        }
    }
}
