// SPDX-License-Identifier: CC0-1.0

//! The closed set of wire keys exchanged with clients (§6) and the small
//! typed payloads that aren't themselves opaque pre-serialized JSON (those
//! live behind [`crate::session`] and the Serialization Cache instead).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every key the Event Fan-Out Engine or Inbound Protocol Decoder may place
/// in an outbound response object, per §6's "Egress keys" list. A closed
/// enum rather than a bare `&str` so a typo in a handler is a compile
/// error, not a silently-dropped field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EgressKey {
    Blocks,
    MempoolBlocks,
    MempoolInfo,
    VBytesPerSecond,
    Fees,
    Da,
    Tomahawk,
    Transactions,
    Block,
    Conversions,
    LoadingIndicators,
    BackendInfo,
    Pong,
    Tx,
    TxPosition,
    TxReplaced,
    TxConfirmed,
    UtxoSpent,
    RbfTransaction,
    RbfInfo,
    RbfLatest,
    RbfLatestSummary,
    /// The Shared Snapshot's own `rbfSummary` field (§3's data-model
    /// table) — distinct from the per-client `RbfLatestSummary` push.
    RbfSummary,
    AddressTransactions,
    AddressRemovedTransactions,
    BlockTransactions,
    MultiAddressTransactions,
    MultiScriptpubkeyTransactions,
    ProjectedBlockTransactions,
    DonationConfirmed,
    Live2hChart,
    TrackAddressesError,
    TrackScriptpubkeysError,
}

impl EgressKey {
    pub const fn as_str(self) -> &'static str {
        use EgressKey::*;
        match self {
            Blocks => "blocks",
            MempoolBlocks => "mempool-blocks",
            MempoolInfo => "mempoolInfo",
            VBytesPerSecond => "vBytesPerSecond",
            Fees => "fees",
            Da => "da",
            Tomahawk => "tomahawk",
            Transactions => "transactions",
            Block => "block",
            Conversions => "conversions",
            LoadingIndicators => "loadingIndicators",
            BackendInfo => "backendInfo",
            Pong => "pong",
            Tx => "tx",
            TxPosition => "txPosition",
            TxReplaced => "txReplaced",
            TxConfirmed => "txConfirmed",
            UtxoSpent => "utxoSpent",
            RbfTransaction => "rbfTransaction",
            RbfInfo => "rbfInfo",
            RbfLatest => "rbfLatest",
            RbfLatestSummary => "rbfLatestSummary",
            RbfSummary => "rbfSummary",
            AddressTransactions => "address-transactions",
            AddressRemovedTransactions => "address-removed-transactions",
            BlockTransactions => "block-transactions",
            MultiAddressTransactions => "multi-address-transactions",
            MultiScriptpubkeyTransactions => "multi-scriptpubkey-transactions",
            ProjectedBlockTransactions => "projected-block-transactions",
            DonationConfirmed => "donationConfirmed",
            Live2hChart => "live-2h-chart",
            TrackAddressesError => "track-addresses-error",
            TrackScriptpubkeysError => "track-scriptpubkeys-error",
        }
    }
}

/// The recognized top-level actions of an inbound frame (§4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Want,
    Init,
    Ping,
}

impl Action {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "want" => Some(Action::Want),
            "init" => Some(Action::Init),
            "ping" => Some(Action::Ping),
            _ => None,
        }
    }
}

/// `projected-block-transactions` payload sent either as a full replacement
/// listing (`blockTransactions`) or an incremental `delta`, never both
/// (§4.1 step 6, §4.2 new-block step 9).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedBlockTransactions {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_transactions: Option<Vec<crate::tx::TxSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<crate::tx::MempoolBlockDelta>,
}

/// `utxoSpent` payload: vout index (as a string key, matching the wire
/// shape in §8 scenario 3) to the spending vin/txid.
pub type UtxoSpentPayload = HashMap<String, OutspendRecord>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutspendRecord {
    pub vin: u32,
    pub txid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egress_key_strings_are_stable() {
        assert_eq!(EgressKey::TxPosition.as_str(), "txPosition");
        assert_eq!(EgressKey::AddressTransactions.as_str(), "address-transactions");
    }

    #[test]
    fn action_parsing() {
        assert_eq!(Action::from_wire("ping"), Some(Action::Ping));
        assert_eq!(Action::from_wire("bogus"), None);
    }
}
