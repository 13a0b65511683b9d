// SPDX-License-Identifier: CC0-1.0

//! The Response Serializer (§4.3): assembles a JSON object out of a map of
//! keys to already-serialized JSON string fragments, without ever
//! re-parsing or re-escaping a value. This is the single most important
//! performance decision in the design — a snapshot or cached fragment
//! rendered once can be copied into thousands of per-client responses for
//! the cost of a string concatenation.

use mempool_fanout_types::EgressKey;

/// An outbound response under construction. Insertion order is preserved
/// (callers tend to build these in a fixed, readable order per event
/// handler) but is not a correctness requirement: every value is valid,
/// independently-parseable JSON, so any ordering of the keys is itself
/// valid JSON.
#[derive(Clone, Debug, Default)]
pub struct Response {
    fields: Vec<(&'static str, String)>,
}

impl Response {
    pub fn new() -> Self {
        Response { fields: Vec::new() }
    }

    /// Inserts a field whose value is already a serialized JSON fragment
    /// (an object, array, string, number, bool or `null` literal). The
    /// caller is responsible for that invariant; this type never
    /// re-escapes or validates it.
    pub fn insert(&mut self, key: EgressKey, already_serialized_json: impl Into<String>) -> &mut Self {
        self.fields.push((key.as_str(), already_serialized_json.into()));
        self
    }

    /// As [`insert`](Self::insert) but takes a raw wire key string, for the
    /// handful of call sites (error keys, donation ids as map keys) that
    /// don't route through [`EgressKey`].
    pub fn insert_raw(&mut self, key: &'static str, already_serialized_json: impl Into<String>) -> &mut Self {
        self.fields.push((key, already_serialized_json.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Renders `{"key1":value1,"key2":value2,...}`. Returns `None` for an
    /// empty response: callers must not send an empty frame (the fan-out
    /// engine skips clients with nothing to say).
    pub fn to_json(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(self.estimated_len());
        out.push('{');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(key);
            out.push_str("\":");
            out.push_str(value);
        }
        out.push('}');
        Some(out)
    }

    fn estimated_len(&self) -> usize {
        self.fields.iter().map(|(k, v)| k.len() + v.len() + 4).sum::<usize>() + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_has_no_json() {
        assert_eq!(Response::new().to_json(), None);
    }

    #[test]
    fn single_field_renders_object() {
        let mut r = Response::new();
        r.insert(EgressKey::Pong, "true");
        assert_eq!(r.to_json().as_deref(), Some(r#"{"pong":true}"#));
    }

    #[test]
    fn multiple_fields_join_with_commas_and_stay_valid_json() {
        let mut r = Response::new();
        r.insert(EgressKey::MempoolInfo, r#"{"size":5000}"#);
        r.insert(EgressKey::Fees, "[1,2,3]");
        let json = r.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["mempoolInfo"]["size"], 5000);
        assert_eq!(parsed["fees"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn insert_raw_supports_error_keys() {
        let mut r = Response::new();
        r.insert_raw("track-addresses-error", r#""too many addresses""#);
        assert_eq!(r.to_json().as_deref(), Some(r#"{"track-addresses-error":"too many addresses"}"#));
    }
}
