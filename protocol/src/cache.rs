// SPDX-License-Identifier: CC0-1.0

//! The Serialization Cache (§3, §4.2): a per-event scratch map from key to
//! already-serialized JSON string. It is seeded by shallow-copying the
//! Shared Snapshot at the start of a fan-out, then filled lazily as the
//! event handler computes fields that weren't already cached — serializing
//! on first miss and handing back the same string on every subsequent hit
//! within that one event.
//!
//! One `SerializationCache` is constructed per upstream event and dropped
//! at the end of that event's fan-out; it is never shared across events.

use std::collections::HashMap;

use mempool_fanout_types::EgressKey;
use serde::Serialize;
use serde_json;

#[derive(Clone, Debug, Default)]
pub struct SerializationCache {
    entries: HashMap<EgressKey, String>,
}

impl SerializationCache {
    pub fn new() -> Self {
        SerializationCache { entries: HashMap::new() }
    }

    /// Seeds the cache from an iterator of already-serialized
    /// `(key, json_string)` pairs — the shallow copy of the Shared
    /// Snapshot taken at the top of an event handler.
    pub fn seed<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (EgressKey, String)>,
    {
        self.entries.extend(fields);
        self
    }

    /// Returns the cached serialization for `key` if present, without
    /// computing anything.
    pub fn get(&self, key: EgressKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    /// Returns the cached string for `key`, or serializes `value` with
    /// `serde_json`, stores it, and returns the freshly cached string.
    /// Every caller within the same event that asks for the same key gets
    /// the same string without re-serializing.
    pub fn get_cached<T: Serialize>(
        &mut self,
        key: EgressKey,
        value: &T,
    ) -> Result<&str, serde_json::Error> {
        if !self.entries.contains_key(&key) {
            let json = serde_json::to_string(value)?;
            self.entries.insert(key, json);
        }
        Ok(self.entries.get(&key).expect("just inserted").as_str())
    }

    /// Directly stores an already-serialized fragment under `key`,
    /// overwriting any previous value. Used when the event handler
    /// computes a field once up front rather than lazily per client.
    pub fn put_raw(&mut self, key: EgressKey, already_serialized_json: impl Into<String>) {
        self.entries.insert(key, already_serialized_json.into());
    }

    pub fn contains(&self, key: EgressKey) -> bool {
        self.entries.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Dummy {
        n: u32,
    }

    #[test]
    fn seeded_values_are_available_without_recompute() {
        let cache = SerializationCache::new().seed([(EgressKey::Blocks, "[1,2,3]".to_string())]);
        assert_eq!(cache.get(EgressKey::Blocks), Some("[1,2,3]"));
    }

    #[test]
    fn get_cached_serializes_once_and_reuses() {
        let mut cache = SerializationCache::new();
        let got = cache.get_cached(EgressKey::Fees, &Dummy { n: 7 }).unwrap().to_string();
        assert_eq!(got, r#"{"n":7}"#);
        // Second call with a *different* value is ignored: the cache
        // already has this key for this event.
        let got2 = cache.get_cached(EgressKey::Fees, &Dummy { n: 99 }).unwrap();
        assert_eq!(got2, r#"{"n":7}"#);
    }

    #[test]
    fn put_raw_overwrites() {
        let mut cache = SerializationCache::new();
        cache.put_raw(EgressKey::Pong, "true");
        cache.put_raw(EgressKey::Pong, "false");
        assert_eq!(cache.get(EgressKey::Pong), Some("false"));
    }
}
