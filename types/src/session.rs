// SPDX-License-Identifier: CC0-1.0

//! Per-connection client session state (§3 "Client Session").
//!
//! A loose bag of optional tracking handles in the distilled specification's
//! source material becomes an explicit, tagged-optional-field struct here
//! (§9's first design note): every tracked handle is `Option<T>` rather than
//! a sentinel value, and every setter stores only the already-validated
//! canonical form, never the raw input.

use std::collections::HashMap;

use crate::address;
use crate::rbf::RbfMode;

/// The five broadcast classes a client can subscribe to via `want`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WantClass {
    Blocks,
    MempoolBlocks,
    Live2hChart,
    Stats,
    Tomahawk,
}

impl WantClass {
    /// Maps the wire string from a `want` frame's `data` array to a class.
    /// Unrecognized strings are ignored per §4.1 ("unknown keys are
    /// ignored").
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "blocks" => Some(WantClass::Blocks),
            "mempool-blocks" => Some(WantClass::MempoolBlocks),
            "live-2h-chart" => Some(WantClass::Live2hChart),
            "stats" => Some(WantClass::Stats),
            "tomahawk" => Some(WantClass::Tomahawk),
            _ => None,
        }
    }

    pub const ALL: [WantClass; 5] = [
        WantClass::Blocks,
        WantClass::MempoolBlocks,
        WantClass::Live2hChart,
        WantClass::Stats,
        WantClass::Tomahawk,
    ];
}

/// The subscription flag set. A plain struct of bools rather than a bitflag
/// type: there are five fixed classes and the fan-out engine reads them by
/// name far more often than as a set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WantFlags {
    pub blocks: bool,
    pub mempool_blocks: bool,
    pub live_2h_chart: bool,
    pub stats: bool,
    pub tomahawk: bool,
}

impl WantFlags {
    pub fn get(&self, class: WantClass) -> bool {
        match class {
            WantClass::Blocks => self.blocks,
            WantClass::MempoolBlocks => self.mempool_blocks,
            WantClass::Live2hChart => self.live_2h_chart,
            WantClass::Stats => self.stats,
            WantClass::Tomahawk => self.tomahawk,
        }
    }

    fn set(&mut self, class: WantClass, value: bool) {
        match class {
            WantClass::Blocks => self.blocks = value,
            WantClass::MempoolBlocks => self.mempool_blocks = value,
            WantClass::Live2hChart => self.live_2h_chart = value,
            WantClass::Stats => self.stats = value,
            WantClass::Tomahawk => self.tomahawk = value,
        }
    }
}

/// The classes that transitioned from off to on within a single `want`
/// frame (§4.1 step 1: "record that in a transient `wantNow` set for this
/// frame"). The decoder uses this to decide which classes get a seeded
/// response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WantDiff {
    pub newly_enabled: Vec<WantClass>,
}

impl WantDiff {
    pub fn contains(&self, class: WantClass) -> bool {
        self.newly_enabled.contains(&class)
    }
}

/// Errors returned by the bounded plural tracking setters. These never
/// close the connection (§7 kind 2): the caller surfaces the message under
/// a `*-error` wire key and clears the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackingLimitExceeded {
    pub max: usize,
    pub got: usize,
}

impl std::fmt::Display for TrackingLimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "too many tracked entries: got {}, max {}", self.got, self.max)
    }
}

impl std::error::Error for TrackingLimitExceeded {}

/// One open connection's subscription and tracking state.
#[derive(Clone, Debug, Default)]
pub struct ClientSession {
    pub remote_address: String,
    pub want: WantFlags,
    pub track_tx: Option<String>,
    pub track_mempool_tx: Option<String>,
    pub track_address: Option<String>,
    pub track_addresses: Option<HashMap<String, String>>,
    pub track_scriptpubkeys: Option<Vec<String>>,
    pub track_asset: Option<String>,
    pub track_mempool_block: Option<u32>,
    pub track_rbf: RbfMode,
    pub track_rbf_summary: bool,
    pub track_donation: Option<String>,
    pub track_bisq_market: Option<String>,
}

impl ClientSession {
    pub fn new(remote_address: impl Into<String>) -> Self {
        ClientSession { remote_address: remote_address.into(), ..Default::default() }
    }

    /// Applies a `want` frame's class list (§4.1 step 1). Classes absent
    /// from `data` are turned off; classes present are turned on. Returns
    /// the classes that were newly enabled by this call.
    pub fn apply_want(&mut self, data: &[WantClass]) -> WantDiff {
        let mut newly_enabled = Vec::new();
        for class in WantClass::ALL {
            let requested = data.contains(&class);
            if requested && !self.want.get(class) {
                newly_enabled.push(class);
            }
            self.want.set(class, requested);
        }
        WantDiff { newly_enabled }
    }

    /// `track-tx`: validates as 64 hex; clears the slot on failure.
    pub fn set_track_tx(&mut self, raw: &str) -> bool {
        match address::validate_hex64(raw) {
            Some(canonical) => {
                self.track_tx = Some(canonical);
                true
            }
            None => {
                self.track_tx = None;
                false
            }
        }
    }

    pub fn clear_track_tx(&mut self) {
        self.track_tx = None;
    }

    /// `track-address`: single canonical address/script.
    pub fn set_track_address(&mut self, raw: &str) -> bool {
        match address::canonicalize(raw) {
            Some(canonical) => {
                self.track_address = Some(canonical);
                true
            }
            None => {
                self.track_address = None;
                false
            }
        }
    }

    /// `track-addresses`: bounded map of raw input to canonical form
    /// (§4.1 step 4). Entries that fail canonicalization are dropped
    /// silently from the map (only the *count* bound produces an error);
    /// an all-invalid input yields an empty, not absent, map.
    pub fn set_track_addresses(
        &mut self,
        raw: &[String],
        max: usize,
    ) -> Result<(), TrackingLimitExceeded> {
        if raw.len() > max {
            self.track_addresses = None;
            return Err(TrackingLimitExceeded { max, got: raw.len() });
        }
        let mut canonical = HashMap::with_capacity(raw.len());
        for input in raw {
            if let Some(c) = address::canonicalize(input) {
                canonical.insert(input.clone(), c);
            }
        }
        self.track_addresses = Some(canonical);
        Ok(())
    }

    /// `track-scriptpubkeys`: bounded list of lowercase hex scripts.
    pub fn set_track_scriptpubkeys(
        &mut self,
        raw: &[String],
        max: usize,
    ) -> Result<(), TrackingLimitExceeded> {
        if raw.len() > max {
            self.track_scriptpubkeys = None;
            return Err(TrackingLimitExceeded { max, got: raw.len() });
        }
        let canonical = raw
            .iter()
            .filter_map(|s| address::validate_scriptpubkey_hex(s))
            .collect();
        self.track_scriptpubkeys = Some(canonical);
        Ok(())
    }

    /// `track-asset`: 64 hex required (sidechain asset id).
    pub fn set_track_asset(&mut self, raw: &str) -> bool {
        match address::validate_hex64(raw) {
            Some(canonical) => {
                self.track_asset = Some(canonical);
                true
            }
            None => {
                self.track_asset = None;
                false
            }
        }
    }

    /// `track-mempool-block`: non-negative integer; anything else clears
    /// the slot (§8 boundary: `0` valid, `-1` clears, non-integer clears).
    pub fn set_track_mempool_block(&mut self, raw: Option<i64>) {
        self.track_mempool_block = match raw {
            Some(n) if n >= 0 => Some(n as u32),
            _ => None,
        };
    }

    /// `track-rbf`: `"all"` or `"fullRbf"` only.
    pub fn set_track_rbf(&mut self, raw: &str) -> bool {
        match RbfMode::from_wire(raw) {
            Some(mode) => {
                self.track_rbf = mode;
                true
            }
            None => {
                self.track_rbf = RbfMode::Off;
                false
            }
        }
    }

    pub fn set_track_rbf_summary(&mut self, value: bool) {
        self.track_rbf_summary = value;
    }

    /// `track-donation`: stored as-is once length-validated (22 chars).
    pub fn set_track_donation(&mut self, raw: &str) -> bool {
        match address::validate_donation_id(raw) {
            Some(canonical) => {
                self.track_donation = Some(canonical);
                true
            }
            None => {
                self.track_donation = None;
                false
            }
        }
    }

    /// `track-bisq-market`: `xxx_xxx` pattern.
    pub fn set_track_bisq_market(&mut self, raw: &str) -> bool {
        match address::validate_bisq_market(raw) {
            Some(canonical) => {
                self.track_bisq_market = Some(canonical);
                true
            }
            None => {
                self.track_bisq_market = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn want_toggle_round_trip() {
        let mut s = ClientSession::new("1.2.3.4");
        let diff = s.apply_want(&[WantClass::Blocks, WantClass::Stats]);
        assert!(diff.contains(WantClass::Blocks));
        assert!(diff.contains(WantClass::Stats));
        assert!(s.want.blocks && s.want.stats);

        // Turning everything off again returns the session to its
        // pre-first-frame state (modulo the seeded response already sent).
        let diff2 = s.apply_want(&[]);
        assert!(diff2.newly_enabled.is_empty());
        assert_eq!(s.want, WantFlags::default());
    }

    #[test]
    fn invalid_track_tx_clears_slot() {
        let mut s = ClientSession::new("1.2.3.4");
        assert!(s.set_track_tx(&"a".repeat(64)));
        assert!(s.track_tx.is_some());
        assert!(!s.set_track_tx("not-hex"));
        assert!(s.track_tx.is_none());
    }

    #[test]
    fn track_addresses_bound_enforced() {
        let mut s = ClientSession::new("1.2.3.4");
        let addrs: Vec<String> = (0..3)
            .map(|i| format!("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfN{}", i))
            .collect();
        assert!(s.set_track_addresses(&addrs, 2).is_err());
        assert!(s.track_addresses.is_none());
    }

    #[test]
    fn track_mempool_block_boundaries() {
        let mut s = ClientSession::new("1.2.3.4");
        s.set_track_mempool_block(Some(0));
        assert_eq!(s.track_mempool_block, Some(0));
        s.set_track_mempool_block(Some(-1));
        assert_eq!(s.track_mempool_block, None);
        s.set_track_mempool_block(None);
        assert_eq!(s.track_mempool_block, None);
    }

    #[test]
    fn track_rbf_only_accepts_known_modes() {
        let mut s = ClientSession::new("1.2.3.4");
        assert!(s.set_track_rbf("all"));
        assert_eq!(s.track_rbf, RbfMode::All);
        assert!(!s.set_track_rbf("nonsense"));
        assert_eq!(s.track_rbf, RbfMode::Off);
    }
}
