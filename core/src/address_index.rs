// SPDX-License-Identifier: CC0-1.0

//! The Address Index Builder (§2.1, §3 "Address Index"): a pure function
//! from a batch of transactions to a map of canonical address/script to the
//! set of transaction ids touching it. Built twice per mempool delta — once
//! for the newly-added set, once for the deleted set — and once per
//! confirmed block.

use std::collections::{HashMap, HashSet};

use mempool_fanout_collab::model::MempoolEntry;

pub type AddressIndex = HashMap<String, HashSet<String>>;

/// Builds an address index from mempool entries, using each entry's
/// `touched_addresses`.
pub fn build_from_mempool_entries<'a, I>(entries: I) -> AddressIndex
where
    I: IntoIterator<Item = &'a MempoolEntry>,
{
    let mut index: AddressIndex = HashMap::new();
    for entry in entries {
        for addr in &entry.touched_addresses {
            index.entry(addr.clone()).or_default().insert(entry.txid.clone());
        }
    }
    index
}

/// Builds an address index from a `txid -> addresses` map, as carried on a
/// confirmed block.
pub fn build_from_touched_map(touched: &HashMap<String, Vec<String>>) -> AddressIndex {
    let mut index: AddressIndex = HashMap::new();
    for (txid, addresses) in touched {
        for addr in addresses {
            index.entry(addr.clone()).or_default().insert(txid.clone());
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use mempool_fanout_collab::model::Input;

    fn entry(txid: &str, addrs: &[&str]) -> MempoolEntry {
        MempoolEntry {
            txid: txid.to_string(),
            fee: 100,
            vsize: 200,
            inputs: vec![Input { txid: "parent".into(), vout: 0 }],
            touched_addresses: addrs.iter().map(|s| s.to_string()).collect(),
            position: None,
            cpfp_dirty: false,
            accelerated: false,
        }
    }

    #[test]
    fn builds_reverse_index_from_entries() {
        let entries = vec![entry("tx1", &["bc1qfoo", "bc1qbar"]), entry("tx2", &["bc1qfoo"])];
        let index = build_from_mempool_entries(&entries);
        assert_eq!(index["bc1qfoo"].len(), 2);
        assert_eq!(index["bc1qbar"].len(), 1);
        assert!(!index.contains_key("bc1qbaz"));
    }

    #[test]
    fn empty_batch_yields_empty_index() {
        let entries: Vec<MempoolEntry> = vec![];
        assert!(build_from_mempool_entries(&entries).is_empty());
    }
}
