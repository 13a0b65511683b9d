// SPDX-License-Identifier: CC0-1.0

//! Shared data types for the mempool fan-out core: canonical address/script
//! forms, per-connection session state, and the wire shapes exchanged with
//! clients.
//!
//! This crate has no knowledge of sockets, of the event fan-out loop, or of
//! the external collaborators (mempool, block template builder, ...) — it is
//! pure data and pure validation, independent of how a value arrived or how
//! it will be sent out.

pub mod address;
pub mod rbf;
pub mod session;
pub mod tx;
pub mod wire;

pub use address::canonicalize;
pub use session::{ClientSession, TrackingLimitExceeded, WantClass, WantDiff, WantFlags};
pub use wire::{Action, EgressKey};
