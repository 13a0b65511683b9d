// SPDX-License-Identifier: CC0-1.0

//! Response assembly for the mempool fan-out core: a serializer that joins
//! already-serialized JSON fragments without re-encoding them (§4.3), and a
//! per-event cache that makes that sharing possible across thousands of
//! client loops for a single upstream event (§3 "Serialization Cache").

pub mod cache;
pub mod serializer;

pub use cache::SerializationCache;
pub use serializer::Response;
