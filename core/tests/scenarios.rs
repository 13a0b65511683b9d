// SPDX-License-Identifier: CC0-1.0

//! End-to-end exercises of the §8 scenarios against the `Engine`, wired to
//! `mempool-fanout-testkit`'s fakes instead of a real mempool/block-template
//! backend. Each test plays one upstream event or inbound frame and inspects
//! exactly what the fan-out engine would have put on the wire.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use mempool_fanout_collab::model::{ConfirmedBlock, Input, MempoolEntry};
use mempool_fanout_core::engine::{Collaborators, Engine, MempoolDeltaInput};
use mempool_fanout_core::registry::ClientHandle;
use mempool_fanout_core::Config;
use mempool_fanout_testkit::FakeCollaborators;
use mempool_fanout_transport::{ClientTransport, Error as TransportError};
use mempool_fanout_types::tx::PositionInfo;

/// A transport that records every frame sent to it instead of touching a
/// real socket.
#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl ClientTransport for CapturingTransport {
    async fn send_text(&self, frame: String) -> Result<(), TransportError> {
        self.sent.lock().push(frame);
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn remote_address(&self) -> String {
        "127.0.0.1:9999".to_string()
    }
}

fn engine_with_fakes() -> (Engine, Arc<FakeCollaborators>) {
    let fakes = Arc::new(FakeCollaborators::new());
    let collab = Collaborators {
        mempool: fakes.mempool.clone(),
        mempool_blocks: fakes.mempool_blocks.clone(),
        blocks: fakes.blocks.clone(),
        difficulty_adjustment: fakes.difficulty_adjustment.clone(),
        fee_api: fakes.fee_api.clone(),
        rbf_cache: fakes.rbf_cache.clone(),
        transaction_utils: fakes.transaction_utils.clone(),
        bitcoin_api: fakes.bitcoin_api.clone(),
        price_updater: fakes.price_updater.clone(),
        backend_info: fakes.backend_info.clone(),
        loading_indicators: fakes.loading_indicators.clone(),
        common: fakes.common.clone(),
        audit: fakes.audit.clone(),
        repositories: fakes.repositories.clone(),
        statistics: fakes.statistics.clone(),
    };
    (Engine::new(Config::default(), collab), fakes)
}

fn register(engine: &Engine) -> (Arc<ClientHandle>, Arc<CapturingTransport>) {
    let transport = Arc::new(CapturingTransport::default());
    let handle = engine.registry.register(transport.clone());
    (handle, transport)
}

fn last_frame(transport: &CapturingTransport) -> serde_json::Value {
    let sent = transport.sent.lock();
    serde_json::from_str(sent.last().expect("a frame was sent")).expect("valid JSON")
}

fn mempool_entry(txid: &str, fee: u64, vsize: u32, inputs: Vec<Input>) -> MempoolEntry {
    MempoolEntry {
        txid: txid.to_string(),
        fee,
        vsize,
        inputs,
        touched_addresses: vec![],
        position: None,
        cpfp_dirty: false,
        accelerated: false,
    }
}

/// §8 scenario 1: `want: [blocks, stats]` seeded from a populated snapshot.
#[tokio::test]
async fn want_blocks_and_stats_seeds_from_snapshot() {
    let (engine, _fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    let blocks: Vec<u32> = (800_000..800_010).collect();
    engine.snapshot.apply([
        (mempool_fanout_types::EgressKey::Blocks, serde_json::to_string(&blocks).unwrap()),
        (mempool_fanout_types::EgressKey::MempoolInfo, r#"{"size":5000,"bytes":0,"total_fee":0.0}"#.to_string()),
        (mempool_fanout_types::EgressKey::VBytesPerSecond, "1.5".to_string()),
        (mempool_fanout_types::EgressKey::Fees, r#"{"fastestFee":20}"#.to_string()),
        (mempool_fanout_types::EgressKey::Da, r#"{"progressPercent":50}"#.to_string()),
    ]);

    engine
        .handle_frame(&handle, r#"{"action":"want","data":["blocks","stats"]}"#)
        .await
        .unwrap();

    let frame = last_frame(&transport);
    assert_eq!(frame["blocks"].as_array().unwrap().len(), 10);
    assert_eq!(frame["mempoolInfo"]["size"], 5000);
    assert_eq!(frame["vBytesPerSecond"], 1.5);
    assert!(frame.get("fees").is_some());
    assert!(frame.get("da").is_some());
}

/// §8 scenario 2: a `track-tx` for a txid already sitting in the mempool
/// with a known position replies with `txPosition`.
#[tokio::test]
async fn track_tx_with_known_position_replies_immediately() {
    let (engine, fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    let txid = "a".repeat(64);
    let mut entry = mempool_entry(&txid, 500, 250, vec![]);
    entry.position = Some(PositionInfo { block: 1, vsize: 1234 });
    fakes.mempool.set_entries(vec![entry]);

    engine
        .handle_frame(&handle, &format!(r#"{{"track-tx":"{txid}"}}"#))
        .await
        .unwrap();

    let frame = last_frame(&transport);
    assert_eq!(frame["txPosition"]["txid"], txid);
    assert_eq!(frame["txPosition"]["position"]["block"], 1);
    assert_eq!(frame["txPosition"]["position"]["vsize"], 1234);
}

/// §8 scenario 3: a tracked transaction's vout gets spent by a transaction
/// arriving in a mempool delta, producing `utxoSpent`.
#[tokio::test]
async fn mempool_delta_reports_outspend_for_tracked_tx() {
    let (engine, _fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    let watched_txid = "a".repeat(64);
    handle.session.lock().track_tx = Some(watched_txid.clone());

    let spender_txid = "b".repeat(64);
    let spender = mempool_entry(&spender_txid, 1000, 200, vec![Input { txid: watched_txid.clone(), vout: 0 }]);

    engine
        .handle_mempool_delta(MempoolDeltaInput { added: vec![spender], removed: vec![] })
        .await;

    let frame = last_frame(&transport);
    assert_eq!(frame["utxoSpent"]["0"]["vin"], 0);
    assert_eq!(frame["utxoSpent"]["0"]["txid"], spender_txid);
}

/// §8 scenario 4: a tracked address appearing in a new block's outputs
/// delivers `block-transactions` stamped with confirmation details.
#[tokio::test]
async fn new_block_delivers_stamped_block_transactions_for_tracked_address() {
    let (engine, _fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    let address = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
    handle.session.lock().track_address = Some(address.to_string());

    let txid = "c".repeat(64);
    let mut touched = std::collections::HashMap::new();
    touched.insert(txid.clone(), vec![address.to_string()]);

    let block = ConfirmedBlock {
        height: 800_010,
        hash: "blockhash".to_string(),
        timestamp: 1_700_000_000,
        txids: vec![txid.clone()],
        transactions: vec![],
        extras: Default::default(),
        touched_addresses: touched,
    };

    engine.handle_new_block(block).await;

    let frame = last_frame(&transport);
    let listing = frame["block-transactions"].as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["txid"], txid);
    assert_eq!(listing[0]["confirmed"], true);
    assert_eq!(listing[0]["block_height"], 800_010);
    assert_eq!(listing[0]["block_hash"], "blockhash");
}

/// §8 scenario 5: `action: init` before any block is known sends nothing.
#[tokio::test]
async fn init_before_blocks_known_sends_nothing() {
    let (engine, _fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    engine.handle_frame(&handle, r#"{"action":"init"}"#).await.unwrap();

    assert!(transport.sent.lock().is_empty());
}

/// §8 scenario 6: `action: ping` replies `{"pong":true}`.
#[tokio::test]
async fn ping_replies_pong() {
    let (engine, _fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    engine.handle_frame(&handle, r#"{"action":"ping"}"#).await.unwrap();

    let frame = last_frame(&transport);
    assert_eq!(frame, serde_json::json!({ "pong": true }));
}

/// A malformed frame closes the connection at the decoder layer (§7 kind 1):
/// the engine surfaces this as an `Err`, never a panic or a partial send.
#[tokio::test]
async fn malformed_frame_is_a_decode_error() {
    let (engine, _fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    let result = engine.handle_frame(&handle, "{not json").await;

    assert!(result.is_err());
    assert!(transport.sent.lock().is_empty());
}

/// `track-addresses` beyond `MAX_TRACKED_ADDRESSES` clears the slot and
/// surfaces `track-addresses-error` instead of closing the connection.
#[tokio::test]
async fn track_addresses_over_limit_surfaces_error_without_closing() {
    let (engine, _fakes) = engine_with_fakes();
    let (handle, transport) = register(&engine);

    let addrs: Vec<String> = (0..engine.config.max_tracked_addresses + 1)
        .map(|i| format!("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfN{}", i))
        .collect();
    let frame = serde_json::json!({ "track-addresses": addrs }).to_string();

    let result = engine.handle_frame(&handle, &frame).await;

    assert!(result.is_ok());
    assert!(handle.session.lock().track_addresses.is_none());
    let sent = last_frame(&transport);
    assert!(sent.get("track-addresses-error").is_some());
}
