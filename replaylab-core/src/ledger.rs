//! Trade ledger — the append-only output of a replay run.

use serde::{Deserialize, Serialize};

use crate::domain::{CompletedTrade, TradeId};
use crate::fingerprint::Digest;

/// Ordered sequence of closed trades, in exit order.
///
/// Only the engine appends. Once a run returns, the ledger is read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeLedger {
    trades: Vec<CompletedTrade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, trade: CompletedTrade) {
        self.trades.push(trade);
    }

    /// Id the next entry will receive: dense and 1-based.
    pub(crate) fn next_id(&self) -> TradeId {
        TradeId(self.trades.len() as u64 + 1)
    }

    pub fn trades(&self) -> &[CompletedTrade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompletedTrade> {
        self.trades.iter()
    }

    pub fn into_vec(self) -> Vec<CompletedTrade> {
        self.trades
    }

    pub fn total_pnl_usd(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl_usd).sum()
    }

    pub fn total_pnl_r(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl_r).sum()
    }

    /// Content digest of the canonical JSON encoding.
    ///
    /// Two runs over the same feed with the same configuration produce equal digests.
    pub fn digest(&self) -> Digest {
        let json = serde_json::to_vec(&self.trades).expect("CompletedTrade must serialize");
        Digest::from_bytes(&json)
    }
}

impl From<Vec<CompletedTrade>> for TradeLedger {
    fn from(trades: Vec<CompletedTrade>) -> Self {
        Self { trades }
    }
}

impl<'a> IntoIterator for &'a TradeLedger {
    type Item = &'a CompletedTrade;
    type IntoIter = std::slice::Iter<'a, CompletedTrade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
