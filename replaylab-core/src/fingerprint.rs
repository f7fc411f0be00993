//! Run fingerprinting — content digests for configs, feeds and ledgers.
//!
//! - `Digest`: hex-encoded blake3 hash.
//! - `RunConfig::config_hash()`: exact identity of a configuration.
//! - `feed_hash()`: identity of the bars that were replayed.
//! - `RunManifest`: everything needed to reproduce or audit a run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RunConfig;
use crate::domain::{AssetSpec, Bar};
use crate::feed::ReplayRange;
use crate::ledger::TradeLedger;

/// Current manifest layout version. Bump on breaking field changes.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Hex-encoded blake3 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for directory names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl RunConfig {
    /// Exact hash of every parameter.
    ///
    /// Canonical serialization: struct fields serialize in declaration order.
    pub fn config_hash(&self) -> Digest {
        let json = serde_json::to_vec(self).expect("RunConfig must serialize");
        Digest::from_bytes(&json)
    }
}

/// Hash the replayed bars, field by field, in feed order.
pub fn feed_hash(bars: &[Bar]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp_micros().to_le_bytes());
        for price in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&price.to_bits().to_le_bytes());
        }
        hasher.update(&[u8::from(bar.sig_long), u8::from(bar.sig_short)]);
        for level in [bar.sl_level, bar.tp_level] {
            match level {
                Some(price) => {
                    hasher.update(&[1]);
                    hasher.update(&price.to_bits().to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
    Digest(hasher.finalize().to_hex().to_string())
}

/// Complete record of a replay run, persisted next to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,

    // ── Configuration ──
    pub asset_name: String,
    /// The spec actually used, after registry fallback.
    pub asset_spec: AssetSpec,
    pub config: RunConfig,
    pub range: ReplayRange,

    // ── Derived hashes ──
    pub config_hash: Digest,
    pub feed_hash: Digest,
    pub ledger_digest: Digest,

    // ── Counts ──
    pub bar_count: usize,
    pub trade_count: usize,
}

impl RunManifest {
    /// Build a manifest for a finished run. `bars` is the feed before range filtering.
    pub fn new(
        config: &RunConfig,
        asset_spec: AssetSpec,
        bars: &[Bar],
        range: ReplayRange,
        ledger: &TradeLedger,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            asset_name: config.asset_name.clone(),
            asset_spec,
            config: config.clone(),
            range,
            config_hash: config.config_hash(),
            feed_hash: feed_hash(bars),
            ledger_digest: ledger.digest(),
            bar_count: bars.len(),
            trade_count: ledger.len(),
        }
    }

    /// Whether `ledger` is the ledger this manifest was built from.
    pub fn matches_ledger(&self, ledger: &TradeLedger) -> bool {
        self.ledger_digest == ledger.digest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetRegistry;
    use chrono::NaiveDate;

    fn bar(minute: u32, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, minute, 0)
                .unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            sig_long: false,
            sig_short: false,
            sl_level: None,
            tp_level: None,
        }
    }

    #[test]
    fn config_hash_tracks_every_parameter() {
        let c1 = RunConfig::default();
        let mut c2 = RunConfig::default();
        assert_eq!(c1.config_hash(), c2.config_hash());

        c2.be_offset_ticks = 1.0;
        assert_ne!(c1.config_hash(), c2.config_hash());
    }

    #[test]
    fn feed_hash_distinguishes_absent_levels() {
        let plain = vec![bar(30, 100.0)];
        let mut with_level = plain.clone();
        with_level[0].sl_level = Some(0.0);
        assert_ne!(feed_hash(&plain), feed_hash(&with_level));
        assert_eq!(feed_hash(&plain), feed_hash(&plain.clone()));
    }

    #[test]
    fn feed_hash_is_order_sensitive() {
        let a = vec![bar(30, 100.0), bar(31, 101.0)];
        let b = vec![bar(31, 101.0), bar(30, 100.0)];
        assert_ne!(feed_hash(&a), feed_hash(&b));
    }

    #[test]
    fn manifest_json_roundtrip() {
        let config = RunConfig::for_asset("ES");
        let spec = *AssetRegistry::builtin().lookup("ES");
        let bars = vec![bar(30, 100.0)];
        let ledger = TradeLedger::new();
        let manifest = RunManifest::new(&config, spec, &bars, ReplayRange::full(), &ledger);

        assert_eq!(manifest.schema_version, MANIFEST_SCHEMA_VERSION);
        assert_eq!(manifest.bar_count, 1);
        assert!(manifest.matches_ledger(&ledger));

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        let back: RunManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn short_digest() {
        let d = Digest::from_bytes(b"replay");
        assert_eq!(d.short().len(), 12);
        assert!(d.as_str().starts_with(d.short()));
    }
}
