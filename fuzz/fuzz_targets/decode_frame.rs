// SPDX-License-Identifier: CC0-1.0

//! Fuzzes the Inbound Protocol Decoder and the synchronous half of the
//! Event Fan-Out Engine together: no input should ever panic
//! `InboundFrame::parse` or `Engine::handle_frame`, malformed JSON and
//! partially-valid frames included.

use std::sync::Arc;

use async_trait::async_trait;
use honggfuzz::fuzz;

use mempool_fanout_core::{Collaborators, Config, Engine};
use mempool_fanout_testkit::FakeCollaborators;
use mempool_fanout_transport::{ClientTransport, Error as TransportError};

struct NullTransport;

#[async_trait]
impl ClientTransport for NullTransport {
    async fn send_text(&self, _frame: String) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn remote_address(&self) -> String {
        "127.0.0.1:0".to_string()
    }
}

fn main() {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let fakes = FakeCollaborators::new();
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
    let engine = Engine::new(Config::default(), collab);
    let client = engine.registry.register(Arc::new(NullTransport));

    loop {
        fuzz!(|data: &[u8]| {
            let Ok(raw) = std::str::from_utf8(data) else { return };
            let _ = runtime.block_on(engine.handle_frame(&client, raw));
        });
    }
}
