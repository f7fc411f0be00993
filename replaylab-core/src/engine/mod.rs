//! Execution engine: single-position replay over a bar feed.

pub mod events;
pub mod pricing;
pub mod replay;
pub mod resolver;
mod state;

pub use crate::feed::ReplayRange;
pub use events::{EngineEvent, EventLog, EventSink, NullSink, SkipReason};
pub use pricing::{plan_entry, settle, EntryPlan, Settlement};
pub use replay::ReplayEngine;
pub use resolver::resolve_exit;
