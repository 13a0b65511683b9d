// SPDX-License-Identifier: CC0-1.0

//! Parsing of a single inbound JSON frame (§4.1) into a typed,
//! still-unvalidated shape. Validation and session mutation happen in
//! [`crate::engine`]; this module's only job is turning wire JSON into
//! Rust values, failing with [`crate::error::DecodeError`] on anything
//! that isn't even well-formed JSON.

use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;

/// The raw shape of an inbound frame. Every field is optional: "any subset
/// may appear in one frame" (§4.1). Unknown top-level keys are ignored by
/// `serde`'s default behavior, matching §4.1's "unknown keys are ignored".
#[derive(Debug, Default, Deserialize)]
pub struct InboundFrame {
    pub action: Option<String>,
    pub data: Option<Vec<String>>,
    #[serde(rename = "refresh-blocks")]
    pub refresh_blocks: Option<Value>,
    #[serde(rename = "track-tx")]
    pub track_tx: Option<String>,
    #[serde(rename = "track-address")]
    pub track_address: Option<String>,
    #[serde(rename = "track-addresses")]
    pub track_addresses: Option<Vec<String>>,
    #[serde(rename = "track-scriptpubkeys")]
    pub track_scriptpubkeys: Option<Vec<String>>,
    #[serde(rename = "track-asset")]
    pub track_asset: Option<String>,
    #[serde(rename = "track-mempool-block")]
    pub track_mempool_block: Option<Value>,
    #[serde(rename = "track-rbf")]
    pub track_rbf: Option<String>,
    #[serde(rename = "track-rbf-summary")]
    pub track_rbf_summary: Option<bool>,
    #[serde(rename = "track-donation")]
    pub track_donation: Option<String>,
    #[serde(rename = "track-bisq-market")]
    pub track_bisq_market: Option<String>,
    #[serde(rename = "watch-mempool")]
    pub watch_mempool: Option<bool>,
}

impl InboundFrame {
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_truthy_refresh_blocks(&self) -> bool {
        match &self.refresh_blocks {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) => false,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        }
    }

    /// `track-mempool-block` accepts only a non-negative JSON integer; any
    /// other shape (string, float, negative) maps to `None`, which the
    /// session setter treats as "clear the slot" (§8 boundary conditions).
    pub fn track_mempool_block_value(&self) -> Option<i64> {
        match &self.track_mempool_block {
            Some(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_ping_frame() {
        let frame = InboundFrame::parse(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(frame.action.as_deref(), Some("ping"));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(InboundFrame::parse("{not json").is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let frame = InboundFrame::parse(r#"{"action":"ping","bogus-key":123}"#).unwrap();
        assert_eq!(frame.action.as_deref(), Some("ping"));
    }

    #[test]
    fn refresh_blocks_truthiness() {
        assert!(InboundFrame::parse(r#"{"refresh-blocks":true}"#).unwrap().is_truthy_refresh_blocks());
        assert!(InboundFrame::parse(r#"{"refresh-blocks":1}"#).unwrap().is_truthy_refresh_blocks());
        assert!(!InboundFrame::parse(r#"{"refresh-blocks":false}"#).unwrap().is_truthy_refresh_blocks());
        assert!(!InboundFrame::parse("{}").unwrap().is_truthy_refresh_blocks());
    }

    #[test]
    fn track_mempool_block_non_integer_is_none() {
        let frame = InboundFrame::parse(r#"{"track-mempool-block":"x"}"#).unwrap();
        assert_eq!(frame.track_mempool_block_value(), None);
        let frame = InboundFrame::parse(r#"{"track-mempool-block":0}"#).unwrap();
        assert_eq!(frame.track_mempool_block_value(), Some(0));
        let frame = InboundFrame::parse(r#"{"track-mempool-block":-1}"#).unwrap();
        assert_eq!(frame.track_mempool_block_value(), Some(-1));
    }
}
