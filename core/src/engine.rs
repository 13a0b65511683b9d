// SPDX-License-Identifier: CC0-1.0

//! The Event Fan-Out Engine (§4.2): on each upstream event, refreshes the
//! Shared Snapshot, builds per-event artifacts (address index, outspend
//! index), then walks a snapshot of live clients and composes a tailored
//! response for each one.
//!
//! Event handlers are `&self` methods — all mutation goes through the
//! lock-guarded [`crate::snapshot::Snapshot`] and each client's own session
//! lock, so handlers never need external synchronization beyond "don't call
//! two of these concurrently" (§5: implementations must serialize event
//! handlers). No handler ever holds a session lock across an `.await`: every
//! lock acquisition here is scoped to a single synchronous block.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use mempool_fanout_collab::model::*;
use mempool_fanout_collab::{
    Audit, BackendInfoApi, BitcoinApi, Blocks, Common, DifficultyAdjustmentApi, Error as CollabError,
    FeeApi, LoadingIndicatorsApi, Mempool, MempoolBlocks, PriceUpdater, RbfCache, Repositories,
    Statistics, TransactionUtils,
};
use mempool_fanout_protocol::{Response, SerializationCache};
use mempool_fanout_types::rbf::RbfMode;
use mempool_fanout_types::tx::{CpfpInfo, TxSummary};
use mempool_fanout_types::wire::{Action, OutspendRecord, ProjectedBlockTransactions};
use mempool_fanout_types::{EgressKey, TrackingLimitExceeded, WantClass, WantDiff};

use crate::address_index::{self, AddressIndex};
use crate::config::Config;
use crate::decoder::InboundFrame;
use crate::error::DecodeError;
use crate::registry::{ClientHandle, Registry};
use crate::snapshot::Snapshot;

/// One `Arc<dyn Trait>` per external collaborator named in §6. Grouped into
/// its own struct so constructing an [`Engine`] is a single call rather than
/// fifteen positional arguments.
pub struct Collaborators {
    pub mempool: Arc<dyn Mempool>,
    pub mempool_blocks: Arc<dyn MempoolBlocks>,
    pub blocks: Arc<dyn Blocks>,
    pub difficulty_adjustment: Arc<dyn DifficultyAdjustmentApi>,
    pub fee_api: Arc<dyn FeeApi>,
    pub rbf_cache: Arc<dyn RbfCache>,
    pub transaction_utils: Arc<dyn TransactionUtils>,
    pub bitcoin_api: Arc<dyn BitcoinApi>,
    pub price_updater: Arc<dyn PriceUpdater>,
    pub backend_info: Arc<dyn BackendInfoApi>,
    pub loading_indicators: Arc<dyn LoadingIndicatorsApi>,
    pub common: Arc<dyn Common>,
    pub audit: Arc<dyn Audit>,
    pub repositories: Arc<dyn Repositories>,
    pub statistics: Arc<dyn Statistics>,
}

/// Logs a collaborator failure at debug and falls back to `T::default()` —
/// §7 kind 3: "log at debug, skip that enrichment, continue fan-out to the
/// same client with whatever else is ready".
fn ok_or_default<T: Default>(result: Result<T, CollabError>, what: &str) -> T {
    result.unwrap_or_else(|e| {
        debug!("{} failed: {}", what, e);
        T::default()
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Inputs to a single mempool-delta event (§4.2 "Mempool delta"). `removed`
/// carries the full deleted transactions (not just their txids) so the
/// Address Index Builder can be run over the deleted set per §4.2 step 7 —
/// by the time a delta is reported, `removed`'s entries are already gone
/// from `mempool.getMempool()` and can't be recovered from it.
pub struct MempoolDeltaInput {
    pub added: Vec<MempoolEntry>,
    pub removed: Vec<MempoolEntry>,
}

pub struct Engine {
    pub registry: Registry,
    pub snapshot: Snapshot,
    pub config: Config,
    pub collab: Collaborators,
}

impl Engine {
    pub fn new(config: Config, collab: Collaborators) -> Self {
        Engine { registry: Registry::new(), snapshot: Snapshot::new(), config, collab }
    }

    // ---------------------------------------------------------------
    // §4.1 Inbound Protocol Decoder
    // ---------------------------------------------------------------

    /// Processes one inbound text frame for `client`. Returns `Err` only for
    /// a malformed frame (§7 kind 1); the caller is responsible for closing
    /// the connection when that happens. Validator rejections are handled
    /// internally and never close the connection.
    pub async fn handle_frame(&self, client: &ClientHandle, raw: &str) -> Result<(), DecodeError> {
        let frame = InboundFrame::parse(raw)?;
        let plan = self.apply_frame_to_session(client, &frame);

        let mut response = Response::new();
        let mut init_blob: Option<String> = None;

        if let Some(e) = plan.track_addresses_error {
            response.insert(EgressKey::TrackAddressesError, to_json(&e.to_string()));
        }
        if let Some(e) = plan.track_scriptpubkeys_error {
            response.insert(EgressKey::TrackScriptpubkeysError, to_json(&e.to_string()));
        }

        if plan.want_diff.contains(WantClass::Blocks) || plan.refresh_blocks {
            if let Some(blocks) = self.snapshot.get(EgressKey::Blocks) {
                response.insert(EgressKey::Blocks, blocks);
            }
        }
        if plan.want_diff.contains(WantClass::MempoolBlocks) {
            if let Some(mb) = self.snapshot.get(EgressKey::MempoolBlocks) {
                response.insert(EgressKey::MempoolBlocks, mb);
            }
        }
        if plan.want_diff.contains(WantClass::Stats) {
            for key in [EgressKey::MempoolInfo, EgressKey::VBytesPerSecond, EgressKey::Fees, EgressKey::Da] {
                if let Some(v) = self.snapshot.get(key) {
                    response.insert(key, v);
                }
            }
        }
        if plan.want_diff.contains(WantClass::Tomahawk) {
            let health = ok_or_default(self.collab.bitcoin_api.get_health_status().await, "get_health_status");
            response.insert(EgressKey::Tomahawk, to_json(&health));
        }

        if let Some(txid) = &plan.new_track_tx {
            let mut resolved = false;
            if plan.watch_mempool {
                if let Ok(Some(replacement_txid)) = self.collab.rbf_cache.get_replaced_by(txid).await {
                    response.insert(
                        EgressKey::TxReplaced,
                        to_json(&serde_json::json!({ "replacedTxid": txid, "replacementTxid": replacement_txid })),
                    );
                    client.session.lock().clear_track_tx();
                    resolved = true;
                } else {
                    let mempool = ok_or_default(self.collab.mempool.get_mempool().await, "get_mempool");
                    match mempool.iter().find(|e| &e.txid == txid) {
                        Some(entry) => {
                            let tx = self.full_or_compressed_tx(entry).await;
                            response.insert(EgressKey::Tx, to_json(&tx));
                        }
                        None => {
                            client.session.lock().track_mempool_tx = Some(txid.clone());
                        }
                    }
                }
            }
            if !resolved {
                let mempool = ok_or_default(self.collab.mempool.get_mempool().await, "get_mempool");
                if let Some(entry) = mempool.iter().find(|e| &e.txid == txid) {
                    if let Some(position) = entry.position {
                        response.insert(EgressKey::TxPosition, to_json(&serde_json::json!({ "txid": txid, "position": position })));
                    }
                }
            }
        }

        if let Some(index) = plan.mempool_block_index {
            let blocks = ok_or_default(
                self.collab.mempool_blocks.get_mempool_blocks_with_transactions().await,
                "get_mempool_blocks_with_transactions",
            );
            if let Some(block) = blocks.iter().find(|b| b.index == index) {
                let payload = ProjectedBlockTransactions { index, block_transactions: Some(block.transactions.clone()), delta: None };
                response.insert(EgressKey::ProjectedBlockTransactions, to_json(&payload));
            }
        }

        if let Some(mode) = plan.rbf_mode_changed {
            let full = matches!(mode, RbfMode::FullRbf);
            let trees = ok_or_default(self.collab.rbf_cache.get_rbf_trees(full).await, "get_rbf_trees");
            response.insert(EgressKey::RbfLatest, to_json(&trees));
        }

        if plan.rbf_summary_on {
            if let Some(summary) = self.snapshot.get(EgressKey::RbfSummary) {
                response.insert(EgressKey::RbfLatestSummary, summary);
            }
        }

        if plan.do_init {
            let missing = !self.snapshot.contains(EgressKey::Blocks)
                || !self.snapshot.contains(EgressKey::Da)
                || !self.snapshot.contains(EgressKey::BackendInfo)
                || !self.snapshot.contains(EgressKey::Conversions);
            if missing {
                self.refresh_init_fields().await;
            }
            if self.snapshot.get(EgressKey::Blocks).map(|b| b.trim() != "[]").unwrap_or(false) {
                init_blob = self.snapshot.init_blob();
            }
        }

        if plan.do_ping {
            response.insert(EgressKey::Pong, "true");
        }

        if client.transport.is_open() {
            if let Some(json) = response.to_json() {
                let _ = client.transport.send_text(json).await;
            }
            if let Some(blob) = init_blob {
                let _ = client.transport.send_text(blob).await;
            }
        }
        Ok(())
    }

    /// Applies every synchronous (non-collaborator-calling) part of an
    /// inbound frame to the client's session under a single short-lived lock
    /// acquisition, returning what the async half of [`Self::handle_frame`]
    /// needs to follow up on.
    fn apply_frame_to_session(&self, client: &ClientHandle, frame: &InboundFrame) -> FramePlan {
        let mut session = client.session.lock();

        let mut want_diff = WantDiff::default();
        if let Some(data) = &frame.data {
            let classes: Vec<WantClass> = data.iter().filter_map(|s| WantClass::from_wire(s)).collect();
            want_diff = session.apply_want(&classes);
        }

        if let Some(raw_addr) = &frame.track_address {
            session.set_track_address(raw_addr);
        }
        let track_addresses_error = frame
            .track_addresses
            .as_ref()
            .and_then(|raw| session.set_track_addresses(raw, self.config.max_tracked_addresses).err());
        let track_scriptpubkeys_error = frame
            .track_scriptpubkeys
            .as_ref()
            .and_then(|raw| session.set_track_scriptpubkeys(raw, self.config.max_tracked_addresses).err());
        if let Some(raw_asset) = &frame.track_asset {
            session.set_track_asset(raw_asset);
        }
        if let Some(raw_donation) = &frame.track_donation {
            session.set_track_donation(raw_donation);
        }
        if let Some(raw_market) = &frame.track_bisq_market {
            session.set_track_bisq_market(raw_market);
        }

        let mut new_track_tx = None;
        if let Some(raw_txid) = &frame.track_tx {
            if session.set_track_tx(raw_txid) {
                new_track_tx = session.track_tx.clone();
            }
        }

        let mut mempool_block_index = None;
        if frame.track_mempool_block.is_some() {
            session.set_track_mempool_block(frame.track_mempool_block_value());
            mempool_block_index = session.track_mempool_block;
        }

        let mut rbf_mode_changed = None;
        if let Some(raw_rbf) = &frame.track_rbf {
            if session.set_track_rbf(raw_rbf) {
                rbf_mode_changed = Some(session.track_rbf);
            }
        }

        let mut rbf_summary_on = false;
        if let Some(on) = frame.track_rbf_summary {
            session.set_track_rbf_summary(on);
            rbf_summary_on = on;
        }

        FramePlan {
            want_diff,
            refresh_blocks: frame.is_truthy_refresh_blocks(),
            new_track_tx,
            watch_mempool: frame.watch_mempool == Some(true),
            rbf_mode_changed,
            rbf_summary_on,
            do_init: frame.action.as_deref().and_then(Action::from_wire) == Some(Action::Init),
            do_ping: frame.action.as_deref().and_then(Action::from_wire) == Some(Action::Ping),
            mempool_block_index,
            track_addresses_error,
            track_scriptpubkeys_error,
        }
    }

    async fn refresh_init_fields(&self) {
        let blocks = ok_or_default(self.collab.blocks.get_blocks(self.config.initial_blocks_amount).await, "get_blocks");
        let da = ok_or_default(self.collab.difficulty_adjustment.get_difficulty_adjustment().await, "get_difficulty_adjustment");
        let backend_info = ok_or_default(self.collab.backend_info.get_backend_info().await, "get_backend_info");
        let prices = ok_or_default(self.collab.price_updater.get_latest_prices().await, "get_latest_prices");
        self.snapshot.apply([
            (EgressKey::Blocks, to_json(&blocks)),
            (EgressKey::Da, to_json(&da)),
            (EgressKey::BackendInfo, to_json(&backend_info)),
            (EgressKey::Conversions, to_json(&prices)),
        ]);
    }

    async fn full_or_compressed_tx(&self, entry: &MempoolEntry) -> TxSummary {
        if self.config.backend != crate::config::Backend::Esplora {
            if let Ok(full) = self.collab.transaction_utils.get_mempool_transaction_extended(&entry.txid).await {
                return full;
            }
        }
        self.collab.mempool_blocks.compress_tx(entry)
    }

    // ---------------------------------------------------------------
    // §4.2 Event Fan-Out Engine
    // ---------------------------------------------------------------

    /// Handles a mempool delta: the bulk of the Event Fan-Out Engine's logic
    /// (§4.2 "Mempool delta").
    pub async fn handle_mempool_delta(&self, input: MempoolDeltaInput) {
        let c = &self.collab;
        let removed_txids: Vec<String> = input.removed.iter().map(|e| e.txid.clone()).collect();

        // Step 1: template builder recomputes projected blocks.
        let full_mempool = ok_or_default(c.mempool.get_mempool().await, "get_mempool");
        let update = match c
            .mempool_blocks
            .update_block_templates(&full_mempool, &input.added, &removed_txids)
            .await
        {
            Ok(u) => u,
            Err(e) => {
                debug!("update_block_templates failed: {}", e);
                return;
            }
        };

        // Step 2: stats fields.
        let mempool_info = ok_or_default(c.mempool.get_mempool_info().await, "get_mempool_info");
        let vbytes = c.mempool.get_v_bytes_per_second().await.unwrap_or(0.0);
        let fees = ok_or_default(c.fee_api.get_recommended_fee().await, "get_recommended_fee");
        let da_result = c.difficulty_adjustment.get_difficulty_adjustment().await;
        let da_available = da_result.is_ok();
        let da = da_result.unwrap_or_else(|e| {
            debug!("get_difficulty_adjustment failed: {}", e);
            DifficultyAdjustment::default()
        });
        let latest_txs = ok_or_default(c.mempool.get_latest_transactions().await, "get_latest_transactions");

        // Step 3: RBF detection.
        let rbf_pairs = c.common.find_rbf_transactions(&input.added, &removed_txids);
        if !rbf_pairs.is_empty() {
            let _ = c.mempool.handle_rbf_transactions(&rbf_pairs).await;
        }
        let new_trees = ok_or_default(c.rbf_cache.get_rbf_changes().await, "get_rbf_changes");
        let mut rbf_narrow = Vec::new();
        let mut rbf_full = Vec::new();
        let mut rbf_summary = None;
        if !new_trees.is_empty() {
            rbf_narrow = ok_or_default(c.rbf_cache.get_rbf_trees(false).await, "get_rbf_trees narrow");
            rbf_full = ok_or_default(c.rbf_cache.get_rbf_trees(true).await, "get_rbf_trees full");
            rbf_summary = c.rbf_cache.get_latest_rbf_summary().await.ok().flatten();
        }

        // Step 4: evict deleted transactions from the RBF cache.
        for txid in &removed_txids {
            let _ = c.rbf_cache.evict(txid).await;
        }

        // Step 5: spend-map update.
        let _ = c.mempool.remove_from_spend_map(&removed_txids).await;
        let _ = c.mempool.add_to_spend_map(&input.added).await;

        // Step 6: refresh the Shared Snapshot. Each field is serialized
        // exactly once here and the same string is handed to every client
        // below through `cache` — §4.3's "rendered once serves thousands of
        // clients" applies just as much to a mempool delta as to `init`.
        let mempool_info_json = to_json(&mempool_info);
        let vbytes_json = to_json(&vbytes);
        let fees_json = to_json(&fees);
        let da_json = to_json(&da);
        let latest_txs_json = to_json(&latest_txs);
        let mempool_blocks_json = to_json(&update.blocks);
        let rbf_summary_json = rbf_summary.as_ref().map(to_json);

        let mut updates = vec![
            (EgressKey::MempoolInfo, mempool_info_json.clone()),
            (EgressKey::VBytesPerSecond, vbytes_json.clone()),
            (EgressKey::Fees, fees_json.clone()),
            (EgressKey::Transactions, latest_txs_json.clone()),
            (EgressKey::MempoolBlocks, mempool_blocks_json.clone()),
        ];
        if da_available {
            updates.push((EgressKey::Da, da_json.clone()));
        }
        if let Some(json) = &rbf_summary_json {
            updates.push((EgressKey::RbfSummary, json.clone()));
        }
        self.snapshot.apply(updates);

        let mut cache = SerializationCache::new();
        cache.put_raw(EgressKey::MempoolInfo, mempool_info_json);
        cache.put_raw(EgressKey::VBytesPerSecond, vbytes_json);
        cache.put_raw(EgressKey::Fees, fees_json);
        if da_available {
            cache.put_raw(EgressKey::Da, da_json);
        }
        cache.put_raw(EgressKey::Transactions, latest_txs_json);
        cache.put_raw(EgressKey::MempoolBlocks, mempool_blocks_json);

        // Step 7: address index over added and deleted sets. `input.removed`
        // already carries the full deleted transactions — they are gone
        // from `full_mempool` by definition, so the deleted index cannot be
        // rebuilt from the live mempool snapshot.
        let added_index = address_index::build_from_mempool_entries(&input.added);
        let deleted_entries = &input.removed;
        let deleted_index = address_index::build_from_mempool_entries(deleted_entries);

        // Step 8: outspend index, keyed by the txid each tracking client is
        // watching.
        let tracked_txids: Vec<String> = self
            .registry
            .snapshot()
            .iter()
            .filter_map(|h| h.session.lock().track_tx.clone())
            .collect();
        let outspend_index = build_outspend_index(&input.added, &tracked_txids);

        // Step 9: per-client fan-out.
        for handle in self.registry.snapshot() {
            if !handle.transport.is_open() {
                continue;
            }
            let mut response = Response::new();
            let (want, track_tx, track_mempool_tx, track_address, track_addresses, track_scriptpubkeys, track_asset, track_mempool_block, track_rbf, track_rbf_summary) = {
                let session = handle.session.lock();
                (
                    session.want,
                    session.track_tx.clone(),
                    session.track_mempool_tx.clone(),
                    session.track_address.clone(),
                    session.track_addresses.clone(),
                    session.track_scriptpubkeys.clone(),
                    session.track_asset.clone(),
                    session.track_mempool_block,
                    session.track_rbf,
                    session.track_rbf_summary,
                )
            };

            if want.stats {
                response.insert(EgressKey::MempoolInfo, cache.get(EgressKey::MempoolInfo).unwrap_or("null").to_string());
                response.insert(EgressKey::VBytesPerSecond, cache.get(EgressKey::VBytesPerSecond).unwrap_or("null").to_string());
                response.insert(EgressKey::Transactions, cache.get(EgressKey::Transactions).unwrap_or("null").to_string());
                // §4.2 "da (if previous-time present)": omitted entirely when
                // the difficulty-adjustment collaborator call failed, rather
                // than sent as a `null` placeholder.
                if let Some(da) = cache.get(EgressKey::Da) {
                    response.insert(EgressKey::Da, da.to_string());
                }
                response.insert(EgressKey::Fees, cache.get(EgressKey::Fees).unwrap_or("null").to_string());
            }
            if want.mempool_blocks {
                response.insert(EgressKey::MempoolBlocks, cache.get(EgressKey::MempoolBlocks).unwrap_or("null").to_string());
            }
            if want.tomahawk {
                if !cache.contains(EgressKey::Tomahawk) {
                    let health = ok_or_default(c.bitcoin_api.get_health_status().await, "get_health_status");
                    cache.put_raw(EgressKey::Tomahawk, to_json(&health));
                }
                response.insert(EgressKey::Tomahawk, cache.get(EgressKey::Tomahawk).expect("tomahawk seeded above").to_string());
            }

            if let Some(watched) = &track_mempool_tx {
                if let Some(entry) = input.added.iter().find(|e| &e.txid == watched) {
                    let tx = self.full_or_compressed_tx(entry).await;
                    response.insert(EgressKey::Tx, to_json(&tx));
                    handle.session.lock().track_mempool_tx = None;
                }
            }

            if let Some(addr) = &track_address {
                let (confirmed, removed) = address_transactions_for(addr, &added_index, &deleted_index, &input.added, deleted_entries);
                if !confirmed.is_empty() {
                    response.insert(EgressKey::AddressTransactions, to_json(&confirmed));
                }
                if !removed.is_empty() {
                    response.insert(EgressKey::AddressRemovedTransactions, to_json(&removed));
                }
            }
            if let Some(addrs) = &track_addresses {
                let mut out: HashMap<String, Vec<TxSummary>> = HashMap::new();
                for canonical in addrs.values() {
                    let (confirmed, _) = address_transactions_for(canonical, &added_index, &deleted_index, &input.added, deleted_entries);
                    if !confirmed.is_empty() {
                        out.insert(canonical.clone(), confirmed);
                    }
                }
                if !out.is_empty() {
                    response.insert(EgressKey::MultiAddressTransactions, to_json(&out));
                }
            }
            if let Some(scripts) = &track_scriptpubkeys {
                let mut out: HashMap<String, Vec<TxSummary>> = HashMap::new();
                for script in scripts {
                    let (confirmed, _) = address_transactions_for(script, &added_index, &deleted_index, &input.added, deleted_entries);
                    if !confirmed.is_empty() {
                        out.insert(script.clone(), confirmed);
                    }
                }
                if !out.is_empty() {
                    response.insert(EgressKey::MultiScriptpubkeyTransactions, to_json(&out));
                }
            }
            if let Some(asset) = &track_asset {
                let (confirmed, _) = address_transactions_for(asset, &added_index, &deleted_index, &input.added, deleted_entries);
                if !confirmed.is_empty() {
                    response.insert(EgressKey::AddressTransactions, to_json(&confirmed));
                }
            }

            if let Some(txid) = &track_tx {
                if let Some(spent) = outspend_index.get(txid) {
                    response.insert(EgressKey::UtxoSpent, to_json(spent));
                }
                if let Ok(Some(replacement_txid)) = c.rbf_cache.get_replaced_by(txid).await {
                    response.insert(
                        EgressKey::RbfTransaction,
                        to_json(&serde_json::json!({ "replacedTxid": txid, "replacementTxid": replacement_txid })),
                    );
                }
                if let Some(tree) = new_trees.iter().find(|t| tree_contains(t, txid)) {
                    response.insert(EgressKey::RbfInfo, to_json(tree));
                }
                if let Some(entry) = full_mempool.iter().chain(input.added.iter()).find(|e| &e.txid == txid) {
                    if let Some(position) = entry.position {
                        if entry.cpfp_dirty {
                            let cpfp = CpfpInfo {
                                ancestors: vec![],
                                descendants: vec![],
                                effective_fee_per_vsize: entry.fee as f64 / entry.vsize.max(1) as f64,
                                sigops: None,
                            };
                            response.insert(
                                EgressKey::TxPosition,
                                to_json(&serde_json::json!({ "txid": txid, "position": position, "cpfp": cpfp })),
                            );
                        } else {
                            response.insert(EgressKey::TxPosition, to_json(&serde_json::json!({ "txid": txid, "position": position })));
                        }
                    }
                }
            }

            if let Some(index) = track_mempool_block {
                if c.mempool.is_in_sync().await {
                    if let Some(delta) = update.deltas.get(index as usize) {
                        if !delta.is_empty() {
                            let payload = ProjectedBlockTransactions { index, block_transactions: None, delta: Some(delta.clone()) };
                            response.insert(EgressKey::ProjectedBlockTransactions, to_json(&payload));
                        }
                    }
                }
            }

            match track_rbf {
                RbfMode::All if !rbf_narrow.is_empty() => {
                    response.insert(EgressKey::RbfLatest, to_json(&rbf_narrow));
                }
                RbfMode::FullRbf if !rbf_full.is_empty() => {
                    response.insert(EgressKey::RbfLatest, to_json(&rbf_full));
                }
                _ => {}
            }
            if track_rbf_summary {
                if let Some(json) = &rbf_summary_json {
                    response.insert(EgressKey::RbfLatestSummary, json.clone());
                }
            }

            if let Some(json) = response.to_json() {
                let _ = handle.transport.send_text(json).await;
            }
        }
    }

    /// Handles a new confirmed block (§4.2 "New block").
    pub async fn handle_new_block(&self, mut block: ConfirmedBlock) {
        let c = &self.collab;

        // Step 1: acceleration bookkeeping, for transactions the mempool
        // engine had already marked accelerated before they were mined.
        if self.config.accelerations {
            for tx in &block.transactions {
                if tx.acceleration == Some(true) {
                    let record = AccelerationRecord { txid: tx.txid.clone(), block_height: block.height, boost_rate: 1.0 };
                    let _ = c.repositories.save_acceleration(&record).await;
                }
            }
        }

        // Step 2: mined RBF detection.
        let full_mempool = ok_or_default(c.mempool.get_mempool().await, "get_mempool");
        let mined_rbf = c.common.find_mined_rbf_transactions(&block.txids, &full_mempool);
        if !mined_rbf.is_empty() {
            let _ = c.mempool.handle_mined_rbf_transactions(&mined_rbf).await;
            for txid in &mined_rbf {
                let _ = c.rbf_cache.mined(txid).await;
            }
        }

        // Step 3: remove mined inputs from the spend map.
        let _ = c.mempool.remove_from_spend_map(&block.txids).await;

        // Step 4: audit, when enabled and in sync.
        if self.config.audit && c.mempool.is_in_sync().await {
            let projected: Vec<MempoolBlock> = if self.config.audit_needs_mempool_clone() {
                ok_or_default(c.mempool_blocks.update_block_templates_for_audit(&full_mempool).await, "update_block_templates_for_audit").blocks
            } else {
                ok_or_default(c.mempool_blocks.get_mempool_blocks().await, "get_mempool_blocks")
            };
            if let Ok(audit) = c.audit.audit_block(&projected, &block).await {
                let similarity = c.common.get_similarity(
                    projected.first().map(|b| b.transactions.as_slice()).unwrap_or(&[]),
                    &block.transactions,
                );
                block.extras.match_rate = Some((audit.score * 10000.0).round() / 100.0);
                block.extras.expected_fees = Some(projected.first().map(|b| b.transactions.iter().map(|t| t.fee).sum()).unwrap_or(0));
                block.extras.expected_weight = Some(projected.first().map(|b| b.transactions.len() as u32 * 4).unwrap_or(0));
                block.extras.similarity = similarity;
                let _ = c.repositories.save_audit(block.height, &audit).await;
            }
        }

        // Step 5: remove mined transactions from the mempool.
        let removed = ok_or_default(c.mempool.remove_mined(&block.txids).await, "remove_mined");
        for txid in &removed {
            let _ = c.rbf_cache.mined(txid).await;
        }

        // Step 6: rebuild the template for the post-block mempool.
        let post_block_mempool = ok_or_default(c.mempool.get_mempool().await, "get_mempool");
        let update = ok_or_default(
            c.mempool_blocks.update_block_templates(&post_block_mempool, &[], &removed).await,
            "update_block_templates",
        );

        // Step 7: refresh the Shared Snapshot.
        let mempool_info = ok_or_default(c.mempool.get_mempool_info().await, "get_mempool_info");
        let loading_indicators = ok_or_default(c.loading_indicators.get_loading_indicators().await, "get_loading_indicators");
        let da = ok_or_default(c.difficulty_adjustment.get_difficulty_adjustment().await, "get_difficulty_adjustment");
        let fees = ok_or_default(c.fee_api.get_recommended_fee().await, "get_recommended_fee");
        let mut blocks_snapshot: Vec<ConfirmedBlock> = ok_or_default(
            c.blocks.get_blocks(self.config.initial_blocks_amount.saturating_sub(1)).await,
            "get_blocks",
        );
        blocks_snapshot.push(block.clone());
        if blocks_snapshot.len() > self.config.initial_blocks_amount {
            let excess = blocks_snapshot.len() - self.config.initial_blocks_amount;
            blocks_snapshot.drain(0..excess);
        }
        let mempool_info_json = to_json(&mempool_info);
        let blocks_snapshot_json = to_json(&blocks_snapshot);
        let mempool_blocks_json = to_json(&update.blocks);
        let loading_indicators_json = to_json(&loading_indicators);
        let da_json = to_json(&da);
        let fees_json = to_json(&fees);
        self.snapshot.apply([
            (EgressKey::MempoolInfo, mempool_info_json.clone()),
            (EgressKey::Blocks, blocks_snapshot_json),
            (EgressKey::MempoolBlocks, mempool_blocks_json.clone()),
            (EgressKey::LoadingIndicators, loading_indicators_json),
            (EgressKey::Da, da_json.clone()),
            (EgressKey::Fees, fees_json.clone()),
        ]);

        let mut cache = SerializationCache::new();
        cache.put_raw(EgressKey::Block, to_json(&block));
        cache.put_raw(EgressKey::MempoolInfo, mempool_info_json);
        cache.put_raw(EgressKey::MempoolBlocks, mempool_blocks_json);
        cache.put_raw(EgressKey::Da, da_json);
        cache.put_raw(EgressKey::Fees, fees_json);
        // Step 7 doesn't recompute vBytesPerSecond; carry forward the Shared
        // Snapshot's current value so want.stats clients still get it (§4.2
        // new-block step 9).
        cache.put_raw(
            EgressKey::VBytesPerSecond,
            self.snapshot.get(EgressKey::VBytesPerSecond).unwrap_or_else(|| "null".to_string()),
        );

        let _ = c.repositories.save_template(block.height, &update.blocks).await;

        // Step 8: address index for the block's own transactions.
        let block_index = address_index::build_from_touched_map(&block.touched_addresses);

        // Step 9: per-client fan-out.
        for handle in self.registry.snapshot() {
            if !handle.transport.is_open() {
                continue;
            }
            let mut response = Response::new();
            let (want, track_tx, track_address, track_addresses, track_scriptpubkeys, track_asset, track_mempool_block) = {
                let session = handle.session.lock();
                (
                    session.want,
                    session.track_tx.clone(),
                    session.track_address.clone(),
                    session.track_addresses.clone(),
                    session.track_scriptpubkeys.clone(),
                    session.track_asset.clone(),
                    session.track_mempool_block,
                )
            };

            if want.blocks {
                response.insert(EgressKey::Block, cache.get(EgressKey::Block).expect("block seeded above").to_string());
            }
            if want.stats {
                response.insert(EgressKey::MempoolInfo, cache.get(EgressKey::MempoolInfo).expect("mempoolInfo seeded above").to_string());
                response.insert(EgressKey::VBytesPerSecond, cache.get(EgressKey::VBytesPerSecond).expect("vBytesPerSecond seeded above").to_string());
                response.insert(EgressKey::Fees, cache.get(EgressKey::Fees).expect("fees seeded above").to_string());
                response.insert(EgressKey::Da, cache.get(EgressKey::Da).expect("da seeded above").to_string());
            }
            if want.mempool_blocks {
                response.insert(EgressKey::MempoolBlocks, cache.get(EgressKey::MempoolBlocks).expect("mempool-blocks seeded above").to_string());
            }
            if want.tomahawk {
                if !cache.contains(EgressKey::Tomahawk) {
                    let health = ok_or_default(c.bitcoin_api.get_health_status().await, "get_health_status");
                    cache.put_raw(EgressKey::Tomahawk, to_json(&health));
                }
                response.insert(EgressKey::Tomahawk, cache.get(EgressKey::Tomahawk).expect("tomahawk seeded above").to_string());
            }

            if let Some(txid) = &track_tx {
                if block.txids.contains(txid) {
                    response.insert(
                        EgressKey::TxConfirmed,
                        to_json(&serde_json::json!({ "txid": txid, "blockHeight": block.height, "blockHash": block.hash })),
                    );
                } else if let Some(entry) = post_block_mempool.iter().find(|e| &e.txid == txid) {
                    if let Some(position) = entry.position {
                        response.insert(EgressKey::TxPosition, to_json(&serde_json::json!({ "txid": txid, "position": position })));
                    }
                }
            }

            let stamp = |txids: &std::collections::HashSet<String>| -> Vec<serde_json::Value> {
                txids
                    .iter()
                    .map(|txid| {
                        serde_json::json!({
                            "txid": txid,
                            "confirmed": true,
                            "block_height": block.height,
                            "block_hash": block.hash,
                            "block_time": block.timestamp,
                        })
                    })
                    .collect()
            };

            if let Some(addr) = &track_address {
                if let Some(txids) = block_index.get(addr) {
                    response.insert(EgressKey::BlockTransactions, to_json(&stamp(txids)));
                }
            }
            if let Some(addrs) = &track_addresses {
                let mut out: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
                for canonical in addrs.values() {
                    if let Some(txids) = block_index.get(canonical) {
                        out.insert(canonical.clone(), stamp(txids));
                    }
                }
                if !out.is_empty() {
                    response.insert(EgressKey::MultiAddressTransactions, to_json(&out));
                }
            }
            if let Some(scripts) = &track_scriptpubkeys {
                let mut out: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
                for script in scripts {
                    if let Some(txids) = block_index.get(script) {
                        out.insert(script.clone(), stamp(txids));
                    }
                }
                if !out.is_empty() {
                    response.insert(EgressKey::MultiScriptpubkeyTransactions, to_json(&out));
                }
            }
            if let Some(asset) = &track_asset {
                if let Some(txids) = block_index.get(asset) {
                    response.insert(EgressKey::AddressTransactions, to_json(&stamp(txids)));
                }
            }

            if let Some(index) = track_mempool_block {
                if c.mempool.is_in_sync().await {
                    if let Some(b) = update.blocks.iter().find(|b| b.index == index) {
                        if let Some(delta) = update.deltas.get(index as usize) {
                            if delta.added.len() * 2 <= block.transactions.len().max(1) {
                                let payload = ProjectedBlockTransactions { index, block_transactions: None, delta: Some(delta.clone()) };
                                response.insert(EgressKey::ProjectedBlockTransactions, to_json(&payload));
                            } else {
                                let payload = ProjectedBlockTransactions { index, block_transactions: Some(b.transactions.clone()), delta: None };
                                response.insert(EgressKey::ProjectedBlockTransactions, to_json(&payload));
                            }
                        }
                    }
                }
            }

            if let Some(json) = response.to_json() {
                let _ = handle.transport.send_text(json).await;
            }
        }
    }

    /// Handles a chain reorganization (§4.2 "Reorg").
    pub async fn handle_reorg(&self) {
        let c = &self.collab;
        let blocks = ok_or_default(c.blocks.get_blocks(self.config.initial_blocks_amount).await, "get_blocks");
        let da = ok_or_default(c.difficulty_adjustment.get_difficulty_adjustment().await, "get_difficulty_adjustment");
        let blocks_json = to_json(&blocks);
        let da_json = to_json(&da);
        self.snapshot.apply([(EgressKey::Blocks, blocks_json.clone()), (EgressKey::Da, da_json.clone())]);

        for handle in self.registry.snapshot() {
            if !handle.transport.is_open() {
                continue;
            }
            let want = handle.session.lock().want;
            let mut response = Response::new();
            if want.blocks {
                response.insert(EgressKey::Blocks, blocks_json.clone());
            }
            if want.stats {
                response.insert(EgressKey::Da, da_json.clone());
            }
            if let Some(json) = response.to_json() {
                let _ = handle.transport.send_text(json).await;
            }
        }
    }

    /// Handles a loading-indicator change: updates the Shared Snapshot then
    /// broadcasts to every client unconditionally (§4.2).
    pub async fn handle_loading_indicators_changed(&self) {
        let indicators = ok_or_default(self.collab.loading_indicators.get_loading_indicators().await, "get_loading_indicators");
        self.snapshot.apply([(EgressKey::LoadingIndicators, to_json(&indicators))]);
        self.broadcast(EgressKey::LoadingIndicators, to_json(&indicators)).await;
    }

    /// Handles a price-feed update (§4.2).
    pub async fn handle_price_change(&self) {
        let prices = ok_or_default(self.collab.price_updater.get_latest_prices().await, "get_latest_prices");
        self.snapshot.apply([(EgressKey::Conversions, to_json(&prices))]);
        self.broadcast(EgressKey::Conversions, to_json(&prices)).await;
    }

    /// Handles a statistics tick, gated by `want-live-2h-chart` (§4.2).
    pub async fn handle_statistics_tick(&self) {
        let stats = match self.collab.statistics.run_statistics().await {
            Ok(v) => v,
            Err(e) => {
                debug!("run_statistics failed: {}", e);
                return;
            }
        };
        let json = to_json(&stats);
        for handle in self.registry.snapshot() {
            if !handle.transport.is_open() {
                continue;
            }
            if handle.session.lock().want.live_2h_chart {
                let mut response = Response::new();
                response.insert(EgressKey::Live2hChart, json.clone());
                if let Some(payload) = response.to_json() {
                    let _ = handle.transport.send_text(payload).await;
                }
            }
        }
    }

    /// Handles a donation confirmation, gated by a matching `trackDonation`
    /// (§4.2).
    pub async fn handle_donation_confirmed(&self, donation_id: &str) {
        for handle in self.registry.snapshot() {
            if !handle.transport.is_open() {
                continue;
            }
            let matches = handle.session.lock().track_donation.as_deref() == Some(donation_id);
            if matches {
                let mut response = Response::new();
                response.insert(EgressKey::DonationConfirmed, to_json(&donation_id));
                if let Some(payload) = response.to_json() {
                    let _ = handle.transport.send_text(payload).await;
                }
            }
        }
    }

    async fn broadcast(&self, key: EgressKey, json: String) {
        for handle in self.registry.snapshot() {
            if !handle.transport.is_open() {
                continue;
            }
            let mut response = Response::new();
            response.insert(key, json.clone());
            if let Some(payload) = response.to_json() {
                let _ = handle.transport.send_text(payload).await;
            }
        }
    }
}

/// What [`Engine::apply_frame_to_session`] learned while mutating the
/// session, for the lock-free async half of [`Engine::handle_frame`] to act
/// on.
struct FramePlan {
    want_diff: WantDiff,
    refresh_blocks: bool,
    new_track_tx: Option<String>,
    watch_mempool: bool,
    rbf_mode_changed: Option<RbfMode>,
    rbf_summary_on: bool,
    do_init: bool,
    do_ping: bool,
    mempool_block_index: Option<u32>,
    track_addresses_error: Option<TrackingLimitExceeded>,
    track_scriptpubkeys_error: Option<TrackingLimitExceeded>,
}

/// Builds the outspend index for §4.2 mempool-delta step 8: for each
/// `added` transaction's inputs that spend a txid a client is currently
/// tracking, record `{srcTxid: {voutIdx: {vin, txid}}}`.
fn build_outspend_index(added: &[MempoolEntry], tracked_txids: &[String]) -> HashMap<String, HashMap<String, OutspendRecord>> {
    let mut index: HashMap<String, HashMap<String, OutspendRecord>> = HashMap::new();
    for tx in added {
        for (vin, input) in tx.inputs.iter().enumerate() {
            if tracked_txids.iter().any(|t| t == &input.txid) {
                index
                    .entry(input.txid.clone())
                    .or_default()
                    .insert(input.vout.to_string(), OutspendRecord { vin: vin as u32, txid: tx.txid.clone() });
            }
        }
    }
    index
}

fn tree_contains(tree: &mempool_fanout_types::rbf::RbfTree, txid: &str) -> bool {
    tree.tx.txid == txid || tree.replaces.iter().any(|child| tree_contains(child, txid))
}

/// Produces the `(confirmed, removed)` transaction listings for a single
/// tracked address/script against a mempool delta's added/deleted address
/// indexes.
fn address_transactions_for(
    canonical: &str,
    added_index: &AddressIndex,
    deleted_index: &AddressIndex,
    added: &[MempoolEntry],
    deleted: &[MempoolEntry],
) -> (Vec<TxSummary>, Vec<TxSummary>) {
    let confirmed = added_index
        .get(canonical)
        .map(|txids| {
            added
                .iter()
                .filter(|e| txids.contains(&e.txid))
                .map(|e| TxSummary { txid: e.txid.clone(), fee: e.fee, vsize: e.vsize, value: None, rate: None, acceleration: Some(e.accelerated) })
                .collect()
        })
        .unwrap_or_default();
    let removed = deleted_index
        .get(canonical)
        .map(|txids| {
            deleted
                .iter()
                .filter(|e| txids.contains(&e.txid))
                .map(|e| TxSummary { txid: e.txid.clone(), fee: e.fee, vsize: e.vsize, value: None, rate: None, acceleration: Some(e.accelerated) })
                .collect()
        })
        .unwrap_or_default();
    (confirmed, removed)
}
