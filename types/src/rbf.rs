// SPDX-License-Identifier: CC0-1.0

//! RBF (replace-by-fee) tree shapes: the narrow and full-RBF listings
//! returned by `track-rbf`/`rbfLatest`, a single replacement notice
//! (`txReplaced`/`rbfTransaction`), and the summary counters used by
//! `track-rbf-summary`.

use serde::{Deserialize, Serialize};

/// Whether a client wants no RBF tracking, the default (opt-in signaled)
/// trees, or every replacement including non-opt-in full-RBF. §3's
/// `trackRbf` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RbfMode {
    #[default]
    Off,
    All,
    FullRbf,
}

impl RbfMode {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "all" => Some(RbfMode::All),
            "fullRbf" => Some(RbfMode::FullRbf),
            _ => None,
        }
    }

    pub fn is_tracking(self) -> bool {
        !matches!(self, RbfMode::Off)
    }
}

/// One node of a replacement tree: the replaced transaction plus its
/// replacement, with fee/vsize deltas. The RBF cache (an external
/// collaborator, §6) is the source of truth; this is the shape it reports
/// through `getRbfTrees`/`getRbfChanges`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RbfTree {
    pub tx: RbfTxNode,
    #[serde(default)]
    pub replaces: Vec<RbfTree>,
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub full_rbf: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RbfTxNode {
    pub txid: String,
    pub fee: u64,
    pub vsize: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

/// A single direct replacement, as delivered via `txReplaced` (watch-mempool
/// path) or `rbfTransaction` (mempool-delta path for a tracked tx).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RbfReplacement {
    pub replaced_txid: String,
    pub replacement: RbfTxNode,
}

/// Aggregate counters served by `track-rbf-summary` / `rbfLatestSummary`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RbfSummary {
    pub count: u64,
    pub full_rbf_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rbf_mode_from_wire() {
        assert_eq!(RbfMode::from_wire("all"), Some(RbfMode::All));
        assert_eq!(RbfMode::from_wire("fullRbf"), Some(RbfMode::FullRbf));
        assert_eq!(RbfMode::from_wire("bogus"), None);
    }

    #[test]
    fn rbf_mode_is_tracking() {
        assert!(!RbfMode::Off.is_tracking());
        assert!(RbfMode::All.is_tracking());
        assert!(RbfMode::FullRbf.is_tracking());
    }
}
