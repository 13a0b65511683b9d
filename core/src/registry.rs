// SPDX-License-Identifier: CC0-1.0

//! The live client registry (§5, §9): dynamic per-client state attached
//! ad-hoc in the distilled spec's source material becomes an explicit
//! session record keyed by connection id here, held in a `DashMap` so
//! registration/deregistration never contends with a fan-out walk.
//!
//! The client set for a single event is always a *snapshot* taken at the
//! top of that event's handler (§5: "the client set is sampled at the
//! start of fan-out"); later connects/disconnects during that event's
//! suspension points must not be observed by it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use mempool_fanout_types::ClientSession;
use parking_lot::Mutex;

use mempool_fanout_transport::ClientTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

/// One registered connection: its session state plus a handle to send
/// frames back out. `session` is behind its own lock distinct from the
/// registry's map-level concurrency, since decoder and engine both mutate
/// it per-connection independent of registry membership changes.
pub struct ClientHandle {
    pub id: ConnectionId,
    pub session: Mutex<ClientSession>,
    pub transport: Arc<dyn ClientTransport>,
}

#[derive(Default)]
pub struct Registry {
    clients: DashMap<ConnectionId, Arc<ClientHandle>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&self, transport: Arc<dyn ClientTransport>) -> Arc<ClientHandle> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = ClientSession::new(transport.remote_address());
        let handle = Arc::new(ClientHandle { id, session: Mutex::new(session), transport });
        self.clients.insert(id, handle.clone());
        handle
    }

    pub fn deregister(&self, id: ConnectionId) {
        self.clients.remove(&id);
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<ClientHandle>> {
        self.clients.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// A snapshot of every currently registered client, for a single
    /// event's fan-out walk.
    pub fn snapshot(&self) -> Vec<Arc<ClientHandle>> {
        self.clients.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl ClientTransport for NullTransport {
        async fn send_text(&self, _frame: String) -> Result<(), mempool_fanout_transport::Error> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }

        fn remote_address(&self) -> String {
            "127.0.0.1:0".to_string()
        }
    }

    #[test]
    fn register_and_snapshot() {
        let registry = Registry::new();
        let h1 = registry.register(Arc::new(NullTransport));
        let h2 = registry.register(Arc::new(NullTransport));
        assert_ne!(h1.id, h2.id);
        assert_eq!(registry.snapshot().len(), 2);

        registry.deregister(h1.id);
        assert_eq!(registry.snapshot().len(), 1);
        assert!(registry.get(h1.id).is_none());
    }
}
