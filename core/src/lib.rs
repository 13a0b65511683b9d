// SPDX-License-Identifier: CC0-1.0

//! The mempool fan-out core: the Inbound Protocol Decoder, Shared Snapshot,
//! Client Registry, Address Index Builder and Event Fan-Out Engine (§2-§4).
//!
//! This crate is generic over its external collaborators
//! (`mempool-fanout-collab`'s traits) and over its transport
//! (`mempool-fanout-transport`'s [`transport::ClientTransport`]); it owns no
//! socket and spawns no task of its own. An embedder constructs an
//! [`engine::Engine`], registers connections as they arrive, calls
//! [`engine::Engine::handle_frame`] per inbound text frame and the
//! `handle_*` event methods as upstream events occur.

pub mod address_index;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod registry;
pub mod snapshot;

pub use address_index::{build_from_mempool_entries, build_from_touched_map, AddressIndex};
pub use config::{Backend, Config};
pub use decoder::InboundFrame;
pub use engine::{Collaborators, Engine, MempoolDeltaInput};
pub use error::DecodeError;
pub use registry::{ClientHandle, ConnectionId, Registry};
pub use snapshot::Snapshot;
