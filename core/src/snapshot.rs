// SPDX-License-Identifier: CC0-1.0

//! The Shared Snapshot (§3): the process-wide "what a new client gets on
//! connect" state. A map of named fields to their most recent serialized
//! value, plus a derived `initBlob` string kept in lock-step with it.
//!
//! Writes happen only from the Event Fan-Out Engine (and collaborator
//! registration calls); every write recomputes `initBlob` under the same
//! write-lock acquisition so a concurrent `init` reader never observes a
//! torn object (§5).

use std::collections::HashMap;

use mempool_fanout_types::EgressKey;
use parking_lot::RwLock;

#[derive(Default)]
struct Inner {
    fields: HashMap<EgressKey, String>,
    init_blob: Option<String>,
}

impl Inner {
    fn recompute_init_blob(&mut self) {
        // `init` is gated on `blocks` being present and non-empty (§4.1
        // step 9). An empty-array serialization ("[]") counts as empty.
        let blocks_populated = self
            .fields
            .get(&EgressKey::Blocks)
            .map(|s| s.trim() != "[]")
            .unwrap_or(false);
        if !blocks_populated {
            self.init_blob = None;
            return;
        }
        let mut out = String::from("{");
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(key.as_str());
            out.push_str("\":");
            out.push_str(value);
        }
        out.push('}');
        self.init_blob = Some(out);
    }
}

/// The Shared Snapshot. Cheap to clone (an `Arc` internally would be added
/// by the embedder); this type itself is the lock-guarded state.
#[derive(Default)]
pub struct Snapshot {
    inner: RwLock<Inner>,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    /// Applies a batch of field updates atomically: readers of
    /// [`Snapshot::init_blob`] never see a state where some but not all of
    /// `updates` have landed.
    pub fn apply<I>(&self, updates: I)
    where
        I: IntoIterator<Item = (EgressKey, String)>,
    {
        let mut inner = self.inner.write();
        for (key, value) in updates {
            inner.fields.insert(key, value);
        }
        inner.recompute_init_blob();
    }

    pub fn get(&self, key: EgressKey) -> Option<String> {
        self.inner.read().fields.get(&key).cloned()
    }

    pub fn contains(&self, key: EgressKey) -> bool {
        self.inner.read().fields.contains_key(&key)
    }

    /// A shallow copy of every populated field, for seeding a per-event
    /// `SerializationCache` (§3 "Serialization Cache").
    pub fn shallow_copy(&self) -> Vec<(EgressKey, String)> {
        self.inner.read().fields.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    /// The precomputed `initBlob`, or `None` if `blocks` is not yet
    /// populated (§4.1 step 9, §6 "Initial snapshot").
    pub fn init_blob(&self) -> Option<String> {
        self.inner.read().init_blob.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_blob_absent_until_blocks_populated() {
        let snap = Snapshot::new();
        assert_eq!(snap.init_blob(), None);
        snap.apply([(EgressKey::MempoolInfo, r#"{"size":1}"#.to_string())]);
        assert_eq!(snap.init_blob(), None);
        snap.apply([(EgressKey::Blocks, "[1,2,3]".to_string())]);
        assert!(snap.init_blob().is_some());
    }

    #[test]
    fn empty_blocks_array_does_not_gate_init_open() {
        let snap = Snapshot::new();
        snap.apply([(EgressKey::Blocks, "[]".to_string())]);
        assert_eq!(snap.init_blob(), None);
    }

    #[test]
    fn apply_is_atomic_across_fields() {
        let snap = Snapshot::new();
        snap.apply([(EgressKey::Blocks, "[1]".to_string()), (EgressKey::Da, r#"{"x":1}"#.to_string())]);
        let blob = snap.init_blob().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(parsed["blocks"], serde_json::json!([1]));
        assert_eq!(parsed["da"]["x"], 1);
    }

    #[test]
    fn shallow_copy_matches_applied_fields() {
        let snap = Snapshot::new();
        snap.apply([(EgressKey::Fees, "[1]".to_string())]);
        let copy = snap.shallow_copy();
        assert_eq!(copy.len(), 1);
        assert_eq!(copy[0], (EgressKey::Fees, "[1]".to_string()));
    }
}
