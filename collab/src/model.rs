// SPDX-License-Identifier: CC0-1.0

//! Plain data shapes passed across the collaborator trait boundary. These
//! are intentionally narrower than a full mempool-engine's internal
//! representation — just enough for the fan-out core to do its job (§1:
//! the mempool engine, template builder, RBF cache, etc. are all declared
//! as external collaborators, not implemented here).

use std::collections::HashMap;

use mempool_fanout_types::rbf::{RbfSummary, RbfTree};
use mempool_fanout_types::tx::{BlockExtras, MempoolBlockDelta, TxSummary};
use serde::{Deserialize, Serialize};

/// A single unconfirmed transaction as the mempool engine reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MempoolEntry {
    pub txid: String,
    pub fee: u64,
    pub vsize: u32,
    pub inputs: Vec<Input>,
    /// Canonical addresses/scripts this transaction's outputs touch, as
    /// produced by prevout/output-script extraction upstream (out of
    /// scope per §1 — transaction enrichment is an external concern). The
    /// Address Index Builder (§2.1, `core::address_index`) consumes this
    /// directly rather than parsing scripts itself.
    #[serde(default)]
    pub touched_addresses: Vec<String>,
    /// Which projected block (if any) and at what position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<mempool_fanout_types::tx::PositionInfo>,
    #[serde(default)]
    pub cpfp_dirty: bool,
    #[serde(default)]
    pub accelerated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub txid: String,
    pub vout: u32,
}

/// `mempool.getMempoolInfo()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MempoolInfo {
    pub size: u64,
    pub bytes: u64,
    pub total_fee: f64,
}

/// Recommended-fee tiers, `feeApi.getRecommendedFee()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub fastest_fee: f64,
    pub half_hour_fee: f64,
    pub hour_fee: f64,
    pub economy_fee: f64,
    pub minimum_fee: f64,
}

/// `difficultyAdjustment.getDifficultyAdjustment()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyAdjustment {
    pub progress_percent: f64,
    pub difficulty_change: f64,
    pub estimated_retarget_date: u64,
    pub remaining_blocks: u32,
}

/// A confirmed block header plus full transaction list, as needed to build
/// both the `blocks` snapshot entries and the `block` fan-out payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedBlock {
    pub height: u32,
    pub hash: String,
    pub timestamp: u64,
    pub txids: Vec<String>,
    pub transactions: Vec<TxSummary>,
    #[serde(default)]
    pub extras: BlockExtras,
    /// Addresses/scripts each transaction's outputs touch, keyed by txid —
    /// see the note on `MempoolEntry::touched_addresses`.
    #[serde(default)]
    pub touched_addresses: HashMap<String, Vec<String>>,
}

/// `bitcoinApi.getHealthStatus()`, surfaced to clients under `tomahawk`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: u32,
}

/// `priceUpdater.getLatestPrices()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Prices {
    pub usd: f64,
    pub eur: f64,
}

/// `backendInfo.getBackendInfo()`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub version: String,
    pub git_commit: String,
}

/// `loadingIndicators.getLoadingIndicators()`: named progress percentages
/// for in-flight indexing work.
pub type LoadingIndicators = HashMap<String, u8>;

/// A single mempool block's transaction listing plus delta versus the
/// previous event, as reported by the (external) template builder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MempoolBlock {
    pub index: u32,
    pub transactions: Vec<TxSummary>,
}

/// Everything the template builder recomputes synchronously per §4.2
/// mempool-delta step 1: "after the call, `mempool-blocks` and
/// `mempool-block-deltas` reflect the new state".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MempoolBlocksUpdate {
    pub blocks: Vec<MempoolBlock>,
    pub deltas: Vec<MempoolBlockDelta>,
}

/// `Audit.auditBlock()` result (§4.2 new-block step 4).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub censored: Vec<String>,
    pub added: Vec<String>,
    pub fresh: Vec<String>,
    pub sigop: Vec<String>,
    pub fullrbf: Vec<String>,
    pub accelerated: Vec<String>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// `rbfCache`'s view of current replacement trees, both the narrow
/// (opt-in only) and full-RBF listings, plus the aggregate summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RbfTreesSnapshot {
    pub narrow: Vec<RbfTree>,
    pub full: Vec<RbfTree>,
    pub summary: RbfSummary,
}

/// An acceleration record persisted per mined, accelerated transaction
/// (§4.2 new-block step 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccelerationRecord {
    pub txid: String,
    pub block_height: u32,
    pub boost_rate: f64,
}
