// SPDX-License-Identifier: CC0-1.0

//! External collaborator interfaces for the mempool fan-out core (§6).
//!
//! §1 deliberately scopes the mempool engine, block-template builder, RBF
//! cache, block store, difficulty-adjustment estimator, fee estimator,
//! price feed, and audit/statistics/acceleration subsystems *out* of the
//! fan-out core. This crate is the seam: every one of those collaborators
//! is declared here as a `Send + Sync` async trait, never implemented. The
//! `core` crate depends only on these traits (via `Arc<dyn Trait>` or a
//! generic parameter); `testkit` supplies fakes that satisfy them for
//! tests.

pub mod error;
pub mod model;
pub mod traits;

pub use error::{Error, Result};
pub use traits::*;
