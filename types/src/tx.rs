// SPDX-License-Identifier: CC0-1.0

//! Transaction summaries and the small supplemental shapes the distilled
//! specification names without giving a concrete field list: a tracked
//! transaction's position inside a projected block, its CPFP detail block,
//! per-block audit extras, and a projected-block delta.

use serde::{Deserialize, Serialize};

/// A transaction as carried in compressed listings (`blockTransactions`,
/// `mempool-block-deltas`, `address-transactions`, ...). Mirrors the wire
/// shape described in §4.1 step 6 and §4.2's new-block handler: enough to
/// render a row in a block/mempool-block view without re-fetching the full
/// transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxSummary {
    pub txid: String,
    pub fee: u64,
    pub vsize: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<bool>,
}

/// Where a tracked transaction currently sits in the projected-block array.
/// Emitted as the `position` field of `txPosition` (§4.1 step 3, §4.2 step
/// 9's "if it is still in the new mempool and has a position").
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub block: u32,
    pub vsize: u32,
}

/// CPFP (child-pays-for-parent) detail attached to `txPosition` when the
/// mempool engine reports the tracked transaction's fee-bump group changed
/// (`cpfpDirty`, §4.2 mempool-delta handler, last bullet under `trackTx`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CpfpInfo {
    pub ancestors: Vec<TxSummary>,
    pub descendants: Vec<TxSummary>,
    pub effective_fee_per_vsize: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigops: Option<i32>,
}

/// Audit-derived extras attached to a confirmed block (§4.2 new-block step
/// 4). `None` fields mean the projection that would have produced them was
/// empty or audit was disabled — per the open question in §9, downstream
/// handling of an absent `similarity` is deliberately unspecified here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_fees: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// The incremental change to a single projected ("mempool") block between
/// two mempool deltas, used for `mempool-block-deltas` and for the
/// new-block handler's choice between sending a delta or a full replacement
/// listing (§4.2 step 9, last bullet: "when `|delta.added| <= |block.
/// transactions|/2`").
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MempoolBlockDelta {
    pub added: Vec<TxSummary>,
    pub removed: Vec<String>,
}

impl MempoolBlockDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A single vin of a new transaction spending a vout this process is
/// watching for (the outspend index, §4.2 mempool-delta step 8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutspendEntry {
    pub vin: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mempool_block_delta_emptiness() {
        assert!(MempoolBlockDelta::default().is_empty());
        let delta = MempoolBlockDelta { added: vec![], removed: vec!["a".into()] };
        assert!(!delta.is_empty());
    }

    #[test]
    fn block_extras_defaults_to_all_none() {
        let extras = BlockExtras::default();
        assert_eq!(extras.similarity, None);
        assert_eq!(extras.match_rate, None);
    }
}
