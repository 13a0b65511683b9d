// SPDX-License-Identifier: CC0-1.0

//! Trait-declared interfaces to every external collaborator named in §6.
//! The fan-out core (`mempool-fanout-core`) is generic over these traits;
//! it never constructs a mempool engine, block-template builder, or RBF
//! cache itself. `mempool-fanout-testkit` supplies in-memory fakes for
//! tests; a real deployment wires these to whatever process actually owns
//! mempool/block state.

use async_trait::async_trait;
use mempool_fanout_types::rbf::{RbfSummary, RbfTree};
use mempool_fanout_types::tx::TxSummary;

use crate::error::Result;
use crate::model::*;

/// `mempool.*` — tracks unconfirmed transactions, their positions in
/// projected blocks, and the spend-map index.
#[async_trait]
pub trait Mempool: Send + Sync {
    async fn get_mempool(&self) -> Result<Vec<MempoolEntry>>;
    async fn get_mempool_info(&self) -> Result<MempoolInfo>;
    async fn get_v_bytes_per_second(&self) -> Result<f64>;
    async fn get_latest_transactions(&self) -> Result<Vec<TxSummary>>;
    async fn is_in_sync(&self) -> bool;
    async fn get_spend_map(&self) -> Result<std::collections::HashMap<String, std::collections::HashMap<u32, String>>>;
    async fn add_to_spend_map(&self, added: &[MempoolEntry]) -> Result<()>;
    async fn remove_from_spend_map(&self, removed_txids: &[String]) -> Result<()>;
    async fn handle_rbf_transactions(&self, replacements: &[(String, String)]) -> Result<()>;
    async fn handle_mined_rbf_transactions(&self, mined_txids: &[String]) -> Result<()>;
    /// Removes mined transactions from the live mempool map (§4.2 new-block
    /// step 5), returning the ones that were actually present.
    async fn remove_mined(&self, txids: &[String]) -> Result<Vec<String>>;
}

/// `mempoolBlocks.*` — the block-template builder's projected-block view.
#[async_trait]
pub trait MempoolBlocks: Send + Sync {
    async fn get_mempool_blocks(&self) -> Result<Vec<MempoolBlock>>;
    async fn get_mempool_block_deltas(&self) -> Result<Vec<mempool_fanout_types::tx::MempoolBlockDelta>>;
    async fn get_mempool_blocks_with_transactions(&self) -> Result<Vec<MempoolBlock>>;
    /// Recomputes projected blocks for the post-delta mempool. Synchronous
    /// contract per §4.2 step 1: after this call returns, the other
    /// getters on this trait reflect the new state.
    async fn update_block_templates(
        &self,
        mempool: &[MempoolEntry],
        added: &[MempoolEntry],
        removed_txids: &[String],
    ) -> Result<MempoolBlocksUpdate>;
    /// Variant used by the audit path (§9 design note: mempool cloning
    /// before audit "when audit algorithm differs from live algorithm").
    /// `mempool` is a caller-owned clone, never the live map.
    async fn update_block_templates_for_audit(
        &self,
        mempool: &[MempoolEntry],
    ) -> Result<MempoolBlocksUpdate>;
    /// `…compressTx` — reduces a full transaction to its compressed wire
    /// form for `blockTransactions` listings.
    fn compress_tx(&self, entry: &MempoolEntry) -> TxSummary;
}

/// `blocks.*` — the block store.
#[async_trait]
pub trait Blocks: Send + Sync {
    async fn get_blocks(&self, amount: usize) -> Result<Vec<ConfirmedBlock>>;
}

/// `difficultyAdjustment.*`.
#[async_trait]
pub trait DifficultyAdjustmentApi: Send + Sync {
    async fn get_difficulty_adjustment(&self) -> Result<DifficultyAdjustment>;
}

/// `feeApi.*`.
#[async_trait]
pub trait FeeApi: Send + Sync {
    async fn get_recommended_fee(&self) -> Result<FeeEstimate>;
}

/// `rbfCache.*` — tracks replacement trees and their eviction on
/// inclusion.
#[async_trait]
pub trait RbfCache: Send + Sync {
    async fn get_replaced_by(&self, txid: &str) -> Result<Option<String>>;
    async fn evict(&self, txid: &str) -> Result<()>;
    async fn mined(&self, txid: &str) -> Result<()>;
    async fn get_rbf_trees(&self, full_rbf: bool) -> Result<Vec<RbfTree>>;
    /// The trees that are new since the last call (§4.2 step 3: "if any
    /// new RBF trees exist").
    async fn get_rbf_changes(&self) -> Result<Vec<RbfTree>>;
    async fn get_latest_rbf_summary(&self) -> Result<Option<RbfSummary>>;
}

/// `transactionUtils.$getMempoolTransactionExtended` — enriches a
/// transaction from the upstream node when the backend is not the default
/// Esplora instance (§4.1 step 3, §4.2 mempool-delta handler's
/// `getFullTransactions`).
#[async_trait]
pub trait TransactionUtils: Send + Sync {
    async fn get_mempool_transaction_extended(&self, txid: &str) -> Result<TxSummary>;
}

/// `bitcoinApi.getHealthStatus`.
#[async_trait]
pub trait BitcoinApi: Send + Sync {
    async fn get_health_status(&self) -> Result<HealthStatus>;
}

/// `priceUpdater.getLatestPrices`.
#[async_trait]
pub trait PriceUpdater: Send + Sync {
    async fn get_latest_prices(&self) -> Result<Prices>;
}

/// `backendInfo.getBackendInfo`.
#[async_trait]
pub trait BackendInfoApi: Send + Sync {
    async fn get_backend_info(&self) -> Result<BackendInfo>;
}

/// `loadingIndicators.getLoadingIndicators`.
#[async_trait]
pub trait LoadingIndicatorsApi: Send + Sync {
    async fn get_loading_indicators(&self) -> Result<LoadingIndicators>;
}

/// `Common.*` static helpers: RBF detection, similarity scoring, asset-id
/// lookup, indexing-enabled flag.
#[async_trait]
pub trait Common: Send + Sync {
    fn find_rbf_transactions(&self, added: &[MempoolEntry], removed_txids: &[String]) -> Vec<(String, String)>;
    fn find_mined_rbf_transactions(&self, block_txids: &[String], mempool: &[MempoolEntry]) -> Vec<String>;
    fn get_similarity(&self, projected: &[TxSummary], actual: &[TxSummary]) -> Option<f64>;
    fn native_asset_id(&self) -> &str;
    fn indexing_enabled(&self) -> bool;
}

/// `Audit.auditBlock`.
#[async_trait]
pub trait Audit: Send + Sync {
    async fn audit_block(
        &self,
        projected: &[MempoolBlock],
        actual: &ConfirmedBlock,
    ) -> Result<AuditResult>;
}

/// Persistence calls the spec lists under §6 without naming a storage
/// engine: `$saveTemplate/$saveAudit/$saveAcceleration`.
#[async_trait]
pub trait Repositories: Send + Sync {
    async fn save_template(&self, height: u32, blocks: &[MempoolBlock]) -> Result<()>;
    async fn save_audit(&self, height: u32, audit: &AuditResult) -> Result<()>;
    async fn save_acceleration(&self, record: &AccelerationRecord) -> Result<()>;
}

/// `statistics.runStatistics` — periodic tick producing the `live-2h-chart`
/// payload.
#[async_trait]
pub trait Statistics: Send + Sync {
    async fn run_statistics(&self) -> Result<serde_json::Value>;
}
