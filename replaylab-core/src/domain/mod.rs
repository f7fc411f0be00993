//! Domain types for ReplayLab

pub mod asset;
pub mod bar;
pub mod position;
pub mod trade;

pub use asset::{round_to_tick, AssetError, AssetRegistry, AssetSpec, DEFAULT_ASSET};
pub use bar::Bar;
pub use position::{Position, Side};
pub use trade::{CompletedTrade, ExitReason, TradeId};
