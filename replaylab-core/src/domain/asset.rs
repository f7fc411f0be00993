//! Asset specifications — tick size, tick value, point value, commission, slippage.
//!
//! The registry is built once (usually from [`AssetRegistry::builtin`]) and
//! injected into the engine. Lookups never fail: an unknown name resolves to the
//! registry's default instrument.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the built-in fallback instrument.
pub const DEFAULT_ASSET: &str = "NQ";

/// Contract specification for a single futures instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Minimum price increment.
    pub tick_size: f64,
    /// Dollar value of one tick per contract.
    pub tick_value: f64,
    /// Dollar value of a full price point per contract.
    pub points_full_value: f64,
    /// Round-trip commission per contract, in dollars.
    pub commission_round_trip: f64,
    /// Average adverse slippage per market fill, in ticks.
    pub avg_slippage_ticks: f64,
}

impl AssetSpec {
    pub const fn new(
        tick_size: f64,
        tick_value: f64,
        points_full_value: f64,
        commission_round_trip: f64,
        avg_slippage_ticks: f64,
    ) -> Self {
        Self {
            tick_size,
            tick_value,
            points_full_value,
            commission_round_trip,
            avg_slippage_ticks,
        }
    }

    /// Commission charged on each side of a round trip.
    pub fn comm_per_side(&self) -> f64 {
        self.commission_round_trip / 2.0
    }

    /// Average slippage expressed in price units.
    pub fn slippage_points(&self) -> f64 {
        self.avg_slippage_ticks * self.tick_size
    }

    /// Round a price to this instrument's tick grid.
    pub fn round_to_tick(&self, price: f64) -> f64 {
        round_to_tick(price, self.tick_size)
    }

    /// Round an optional level; an absent level stays absent.
    pub fn round_level(&self, level: Option<f64>) -> Option<f64> {
        level.map(|p| self.round_to_tick(p))
    }

    /// Reject specs that would make sizing or rounding meaningless.
    pub fn validate(&self) -> Result<(), AssetError> {
        if !(self.tick_size > 0.0 && self.tick_size.is_finite()) {
            return Err(AssetError::InvalidField {
                field: "tick_size",
                value: self.tick_size,
            });
        }
        if !(self.tick_value > 0.0 && self.tick_value.is_finite()) {
            return Err(AssetError::InvalidField {
                field: "tick_value",
                value: self.tick_value,
            });
        }
        if !(self.points_full_value > 0.0 && self.points_full_value.is_finite()) {
            return Err(AssetError::InvalidField {
                field: "points_full_value",
                value: self.points_full_value,
            });
        }
        if self.commission_round_trip < 0.0 || !self.commission_round_trip.is_finite() {
            return Err(AssetError::InvalidField {
                field: "commission_round_trip",
                value: self.commission_round_trip,
            });
        }
        if self.avg_slippage_ticks < 0.0 || !self.avg_slippage_ticks.is_finite() {
            return Err(AssetError::InvalidField {
                field: "avg_slippage_ticks",
                value: self.avg_slippage_ticks,
            });
        }
        Ok(())
    }
}

/// Round `price` to the nearest multiple of `tick_size`, ties to even.
///
/// NaN passes through unchanged. Idempotent: rounding an already rounded
/// price returns the same value.
pub fn round_to_tick(price: f64, tick_size: f64) -> f64 {
    (price / tick_size).round_ties_even() * tick_size
}

/// Instrument table keyed by name, with a designated fallback.
///
/// The fallback is always present in the table, so [`AssetRegistry::lookup`]
/// cannot miss.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    specs: BTreeMap<String, AssetSpec>,
    default_name: String,
}

impl AssetRegistry {
    /// Registry with a single instrument, which is also the fallback.
    pub fn new(default_name: impl Into<String>, default_spec: AssetSpec) -> Self {
        let default_name = default_name.into();
        let mut specs = BTreeMap::new();
        specs.insert(default_name.clone(), default_spec);
        Self {
            specs,
            default_name,
        }
    }

    /// The built-in futures table (NQ, ES, YM, GC, CL) with NQ as fallback.
    pub fn builtin() -> Self {
        let mut registry = Self::new(DEFAULT_ASSET, AssetSpec::new(0.25, 5.0, 20.0, 10.40, 2.0));
        registry.insert("ES", AssetSpec::new(0.25, 12.5, 50.0, 10.40, 1.0));
        registry.insert("YM", AssetSpec::new(1.0, 5.0, 5.0, 10.40, 1.0));
        registry.insert("GC", AssetSpec::new(0.1, 10.0, 100.0, 13.40, 1.0));
        registry.insert("CL", AssetSpec::new(0.01, 10.0, 1000.0, 13.40, 2.0));
        registry
    }

    fn insert(&mut self, name: &str, spec: AssetSpec) {
        self.specs.insert(name.to_string(), spec);
    }

    /// Add or replace an instrument after validating it.
    pub fn register(&mut self, name: impl Into<String>, spec: AssetSpec) -> Result<(), AssetError> {
        spec.validate()?;
        self.specs.insert(name.into(), spec);
        Ok(())
    }

    /// Switch the fallback instrument. The name must already be registered.
    pub fn with_default(mut self, name: &str) -> Result<Self, AssetError> {
        if !self.specs.contains_key(name) {
            return Err(AssetError::UnknownDefault(name.to_string()));
        }
        self.default_name = name.to_string();
        Ok(self)
    }

    /// Spec for `name`, or the fallback spec when `name` is unknown.
    pub fn lookup(&self, name: &str) -> &AssetSpec {
        match self.specs.get(name) {
            Some(spec) => spec,
            None => {
                tracing::debug!(
                    asset = name,
                    fallback = %self.default_name,
                    "unknown asset, using fallback spec"
                );
                &self.specs[&self.default_name]
            }
        }
    }

    /// Whether `name` is registered (no fallback).
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// All registered instruments in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AssetError {
    #[error("asset field {field} has invalid value {value}")]
    InvalidField { field: &'static str, value: f64 },

    #[error("cannot use '{0}' as fallback: not registered")]
    UnknownDefault(String),
}
