// SPDX-License-Identifier: CC0-1.0

//! In-memory fakes for every collaborator trait in `mempool-fanout-collab`,
//! useful in integration testing environments: a throwaway backend so the
//! rest of the workspace has something concrete to talk to in tests instead
//! of a live mempool/node process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mempool_fanout_collab::model::*;
use mempool_fanout_collab::{
    Audit, BackendInfoApi, BitcoinApi, Blocks, Common, DifficultyAdjustmentApi, FeeApi,
    LoadingIndicatorsApi, Mempool, MempoolBlocks, PriceUpdater, RbfCache, Repositories,
    Result, Statistics, TransactionUtils,
};
use mempool_fanout_types::rbf::{RbfSummary, RbfTree};
use mempool_fanout_types::tx::{MempoolBlockDelta, TxSummary};
use parking_lot::Mutex;

/// A single in-memory mempool, mutated directly by tests via
/// [`FakeMempool::set_entries`] to simulate upstream deltas.
#[derive(Default)]
pub struct FakeMempool {
    entries: Mutex<HashMap<String, MempoolEntry>>,
    spend_map: Mutex<HashMap<String, HashMap<u32, String>>>,
    in_sync: Mutex<bool>,
}

impl FakeMempool {
    pub fn new() -> Self {
        FakeMempool { in_sync: Mutex::new(true), ..Default::default() }
    }

    pub fn set_entries(&self, entries: Vec<MempoolEntry>) {
        let mut map = self.entries.lock();
        map.clear();
        for e in entries {
            map.insert(e.txid.clone(), e);
        }
    }

    pub fn set_in_sync(&self, value: bool) {
        *self.in_sync.lock() = value;
    }
}

#[async_trait]
impl Mempool for FakeMempool {
    async fn get_mempool(&self) -> Result<Vec<MempoolEntry>> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo> {
        let map = self.entries.lock();
        let bytes: u64 = map.values().map(|e| e.vsize as u64).sum();
        let total_fee: f64 = map.values().map(|e| e.fee as f64).sum();
        Ok(MempoolInfo { size: map.len() as u64, bytes, total_fee })
    }

    async fn get_v_bytes_per_second(&self) -> Result<f64> {
        Ok(0.0)
    }

    async fn get_latest_transactions(&self) -> Result<Vec<TxSummary>> {
        Ok(self
            .entries
            .lock()
            .values()
            .map(|e| TxSummary { txid: e.txid.clone(), fee: e.fee, vsize: e.vsize, value: None, rate: None, acceleration: Some(e.accelerated) })
            .collect())
    }

    async fn is_in_sync(&self) -> bool {
        *self.in_sync.lock()
    }

    async fn get_spend_map(&self) -> Result<HashMap<String, HashMap<u32, String>>> {
        Ok(self.spend_map.lock().clone())
    }

    async fn add_to_spend_map(&self, added: &[MempoolEntry]) -> Result<()> {
        let mut map = self.spend_map.lock();
        for tx in added {
            for input in &tx.inputs {
                map.entry(input.txid.clone()).or_default().insert(input.vout, tx.txid.clone());
            }
        }
        Ok(())
    }

    async fn remove_from_spend_map(&self, removed_txids: &[String]) -> Result<()> {
        let mut map = self.spend_map.lock();
        map.retain(|srcid, _| !removed_txids.contains(srcid));
        Ok(())
    }

    async fn handle_rbf_transactions(&self, _replacements: &[(String, String)]) -> Result<()> {
        Ok(())
    }

    async fn handle_mined_rbf_transactions(&self, _mined_txids: &[String]) -> Result<()> {
        Ok(())
    }

    async fn remove_mined(&self, txids: &[String]) -> Result<Vec<String>> {
        let mut map = self.entries.lock();
        let mut removed = Vec::new();
        for txid in txids {
            if map.remove(txid).is_some() {
                removed.push(txid.clone());
            }
        }
        Ok(removed)
    }
}

/// A trivial template builder: one projected block holding whatever the
/// live mempool currently contains, in insertion order.
#[derive(Default)]
pub struct FakeMempoolBlocks {
    blocks: Mutex<Vec<MempoolBlock>>,
    deltas: Mutex<Vec<MempoolBlockDelta>>,
}

impl FakeMempoolBlocks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MempoolBlocks for FakeMempoolBlocks {
    async fn get_mempool_blocks(&self) -> Result<Vec<MempoolBlock>> {
        Ok(self.blocks.lock().clone())
    }

    async fn get_mempool_block_deltas(&self) -> Result<Vec<MempoolBlockDelta>> {
        Ok(self.deltas.lock().clone())
    }

    async fn get_mempool_blocks_with_transactions(&self) -> Result<Vec<MempoolBlock>> {
        Ok(self.blocks.lock().clone())
    }

    async fn update_block_templates(
        &self,
        mempool: &[MempoolEntry],
        added: &[MempoolEntry],
        removed_txids: &[String],
    ) -> Result<MempoolBlocksUpdate> {
        let txs: Vec<TxSummary> = mempool.iter().map(|e| self.compress_tx(e)).collect();
        let block = MempoolBlock { index: 0, transactions: txs };
        let delta = MempoolBlockDelta {
            added: added.iter().map(|e| self.compress_tx(e)).collect(),
            removed: removed_txids.to_vec(),
        };
        *self.blocks.lock() = vec![block.clone()];
        *self.deltas.lock() = vec![delta.clone()];
        Ok(MempoolBlocksUpdate { blocks: vec![block], deltas: vec![delta] })
    }

    async fn update_block_templates_for_audit(&self, mempool: &[MempoolEntry]) -> Result<MempoolBlocksUpdate> {
        let txs: Vec<TxSummary> = mempool.iter().map(|e| self.compress_tx(e)).collect();
        let block = MempoolBlock { index: 0, transactions: txs };
        Ok(MempoolBlocksUpdate { blocks: vec![block], deltas: vec![] })
    }

    fn compress_tx(&self, entry: &MempoolEntry) -> TxSummary {
        TxSummary {
            txid: entry.txid.clone(),
            fee: entry.fee,
            vsize: entry.vsize,
            value: None,
            rate: Some(entry.fee as f64 / entry.vsize.max(1) as f64),
            acceleration: Some(entry.accelerated),
        }
    }
}

#[derive(Default)]
pub struct FakeBlocks {
    blocks: Mutex<Vec<ConfirmedBlock>>,
}

impl FakeBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, block: ConfirmedBlock) {
        self.blocks.lock().push(block);
    }
}

#[async_trait]
impl Blocks for FakeBlocks {
    async fn get_blocks(&self, amount: usize) -> Result<Vec<ConfirmedBlock>> {
        let blocks = self.blocks.lock();
        let start = blocks.len().saturating_sub(amount);
        Ok(blocks[start..].to_vec())
    }
}

#[derive(Default)]
pub struct FakeDifficultyAdjustment;

#[async_trait]
impl DifficultyAdjustmentApi for FakeDifficultyAdjustment {
    async fn get_difficulty_adjustment(&self) -> Result<DifficultyAdjustment> {
        Ok(DifficultyAdjustment::default())
    }
}

#[derive(Default)]
pub struct FakeFeeApi;

#[async_trait]
impl FeeApi for FakeFeeApi {
    async fn get_recommended_fee(&self) -> Result<FeeEstimate> {
        Ok(FeeEstimate {
            fastest_fee: 20.0,
            half_hour_fee: 15.0,
            hour_fee: 10.0,
            economy_fee: 5.0,
            minimum_fee: 1.0,
        })
    }
}

#[derive(Default)]
pub struct FakeRbfCache {
    replaced_by: Mutex<HashMap<String, String>>,
    trees: Mutex<Vec<RbfTree>>,
    changes: Mutex<Vec<RbfTree>>,
    summary: Mutex<Option<RbfSummary>>,
}

impl FakeRbfCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_replacement(&self, replaced_txid: &str, replacement_txid: &str) {
        self.replaced_by.lock().insert(replaced_txid.to_string(), replacement_txid.to_string());
    }

    pub fn push_tree(&self, tree: RbfTree) {
        self.trees.lock().push(tree.clone());
        self.changes.lock().push(tree);
    }
}

#[async_trait]
impl RbfCache for FakeRbfCache {
    async fn get_replaced_by(&self, txid: &str) -> Result<Option<String>> {
        Ok(self.replaced_by.lock().get(txid).cloned())
    }

    async fn evict(&self, txid: &str) -> Result<()> {
        self.replaced_by.lock().remove(txid);
        Ok(())
    }

    async fn mined(&self, txid: &str) -> Result<()> {
        self.replaced_by.lock().remove(txid);
        Ok(())
    }

    async fn get_rbf_trees(&self, _full_rbf: bool) -> Result<Vec<RbfTree>> {
        Ok(self.trees.lock().clone())
    }

    async fn get_rbf_changes(&self) -> Result<Vec<RbfTree>> {
        Ok(std::mem::take(&mut *self.changes.lock()))
    }

    async fn get_latest_rbf_summary(&self) -> Result<Option<RbfSummary>> {
        Ok(*self.summary.lock())
    }
}

#[derive(Default)]
pub struct FakeTransactionUtils;

#[async_trait]
impl TransactionUtils for FakeTransactionUtils {
    async fn get_mempool_transaction_extended(&self, txid: &str) -> Result<TxSummary> {
        Ok(TxSummary { txid: txid.to_string(), fee: 0, vsize: 0, value: None, rate: None, acceleration: None })
    }
}

#[derive(Default)]
pub struct FakeBitcoinApi;

#[async_trait]
impl BitcoinApi for FakeBitcoinApi {
    async fn get_health_status(&self) -> Result<HealthStatus> {
        Ok(HealthStatus { healthy: true, latency_ms: 5 })
    }
}

#[derive(Default)]
pub struct FakePriceUpdater;

#[async_trait]
impl PriceUpdater for FakePriceUpdater {
    async fn get_latest_prices(&self) -> Result<Prices> {
        Ok(Prices { usd: 65000.0, eur: 60000.0 })
    }
}

#[derive(Default)]
pub struct FakeBackendInfo;

#[async_trait]
impl BackendInfoApi for FakeBackendInfo {
    async fn get_backend_info(&self) -> Result<BackendInfo> {
        Ok(BackendInfo { version: "testkit".into(), git_commit: "0000000".into() })
    }
}

#[derive(Default)]
pub struct FakeLoadingIndicators;

#[async_trait]
impl LoadingIndicatorsApi for FakeLoadingIndicators {
    async fn get_loading_indicators(&self) -> Result<LoadingIndicators> {
        Ok(HashMap::new())
    }
}

#[derive(Default)]
pub struct FakeCommon;

#[async_trait]
impl Common for FakeCommon {
    fn find_rbf_transactions(&self, added: &[MempoolEntry], removed_txids: &[String]) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for tx in added {
            for input in &tx.inputs {
                if removed_txids.contains(&input.txid) {
                    out.push((input.txid.clone(), tx.txid.clone()));
                }
            }
        }
        out
    }

    fn find_mined_rbf_transactions(&self, _block_txids: &[String], _mempool: &[MempoolEntry]) -> Vec<String> {
        Vec::new()
    }

    fn get_similarity(&self, projected: &[TxSummary], actual: &[TxSummary]) -> Option<f64> {
        if projected.is_empty() {
            return None;
        }
        let matched = actual.iter().filter(|a| projected.iter().any(|p| p.txid == a.txid)).count();
        Some(matched as f64 / projected.len() as f64)
    }

    fn native_asset_id(&self) -> &str {
        "0000000000000000000000000000000000000000000000000000000000000000"
    }

    fn indexing_enabled(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct FakeAudit;

#[async_trait]
impl Audit for FakeAudit {
    async fn audit_block(&self, projected: &[MempoolBlock], actual: &ConfirmedBlock) -> Result<AuditResult> {
        let projected_txids: Vec<String> =
            projected.first().map(|b| b.transactions.iter().map(|t| t.txid.clone()).collect()).unwrap_or_default();
        let added: Vec<String> =
            actual.txids.iter().filter(|id| !projected_txids.contains(id)).cloned().collect();
        let censored: Vec<String> =
            projected_txids.iter().filter(|id| !actual.txids.contains(id)).cloned().collect();
        let score = if projected_txids.is_empty() {
            0.0
        } else {
            1.0 - (censored.len() as f64 / projected_txids.len() as f64)
        };
        Ok(AuditResult {
            censored,
            added,
            fresh: Vec::new(),
            sigop: Vec::new(),
            fullrbf: Vec::new(),
            accelerated: Vec::new(),
            score,
            similarity: if projected_txids.is_empty() { None } else { Some(score) },
        })
    }
}

#[derive(Default)]
pub struct FakeRepositories {
    pub saved_templates: Mutex<Vec<u32>>,
    pub saved_audits: Mutex<Vec<u32>>,
    pub saved_accelerations: Mutex<Vec<AccelerationRecord>>,
}

#[async_trait]
impl Repositories for FakeRepositories {
    async fn save_template(&self, height: u32, _blocks: &[MempoolBlock]) -> Result<()> {
        self.saved_templates.lock().push(height);
        Ok(())
    }

    async fn save_audit(&self, height: u32, _audit: &AuditResult) -> Result<()> {
        self.saved_audits.lock().push(height);
        Ok(())
    }

    async fn save_acceleration(&self, record: &AccelerationRecord) -> Result<()> {
        self.saved_accelerations.lock().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStatistics;

#[async_trait]
impl Statistics for FakeStatistics {
    async fn run_statistics(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "ticked": true }))
    }
}

/// A full bundle of fakes, one `Arc` per collaborator trait, convenient for
/// wiring up `core::engine::Engine` in tests without repeating the
/// boilerplate at every call site.
pub struct FakeCollaborators {
    pub mempool: Arc<FakeMempool>,
    pub mempool_blocks: Arc<FakeMempoolBlocks>,
    pub blocks: Arc<FakeBlocks>,
    pub difficulty_adjustment: Arc<FakeDifficultyAdjustment>,
    pub fee_api: Arc<FakeFeeApi>,
    pub rbf_cache: Arc<FakeRbfCache>,
    pub transaction_utils: Arc<FakeTransactionUtils>,
    pub bitcoin_api: Arc<FakeBitcoinApi>,
    pub price_updater: Arc<FakePriceUpdater>,
    pub backend_info: Arc<FakeBackendInfo>,
    pub loading_indicators: Arc<FakeLoadingIndicators>,
    pub common: Arc<FakeCommon>,
    pub audit: Arc<FakeAudit>,
    pub repositories: Arc<FakeRepositories>,
    pub statistics: Arc<FakeStatistics>,
}

impl Default for FakeCollaborators {
    fn default() -> Self {
        FakeCollaborators {
            mempool: Arc::new(FakeMempool::new()),
            mempool_blocks: Arc::new(FakeMempoolBlocks::new()),
            blocks: Arc::new(FakeBlocks::new()),
            difficulty_adjustment: Arc::new(FakeDifficultyAdjustment),
            fee_api: Arc::new(FakeFeeApi),
            rbf_cache: Arc::new(FakeRbfCache::new()),
            transaction_utils: Arc::new(FakeTransactionUtils),
            bitcoin_api: Arc::new(FakeBitcoinApi),
            price_updater: Arc::new(FakePriceUpdater),
            backend_info: Arc::new(FakeBackendInfo),
            loading_indicators: Arc::new(FakeLoadingIndicators),
            common: Arc::new(FakeCommon),
            audit: Arc::new(FakeAudit),
            repositories: Arc::new(FakeRepositories::default()),
            statistics: Arc::new(FakeStatistics),
        }
    }
}

impl FakeCollaborators {
    pub fn new() -> Self {
        Self::default()
    }
}
