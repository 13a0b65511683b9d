// SPDX-License-Identifier: CC0-1.0

//! Fan-out engine configuration (§6). A plain struct with a `Default`
//! impl, overridable field-by-field by the embedder — the teacher avoids
//! configuration-framework dependencies and expects callers to construct
//! `Auth`/`Client` by hand, so this follows the same minimalism rather than
//! reaching for `config`/`figment`.

/// Which upstream indexer backend is in use. Non-Esplora backends trigger
/// the `getFullTransactions`/`getMempoolTransactionExtended` enrichment
/// path described throughout §4.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Esplora,
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Cap on the `blocks` snapshot array maintained in the Shared
    /// Snapshot (§4.2 new-block step 7).
    pub initial_blocks_amount: usize,
    /// Per-connection cap on `track-addresses` / `track-scriptpubkeys`
    /// (§3, §8).
    pub max_tracked_addresses: usize,
    /// Whether the advanced (non-default) GBT-based template algorithm is
    /// used for the live mempool-blocks projection.
    pub advanced_gbt_mempool: bool,
    /// Whether the advanced GBT-based algorithm is used for audit
    /// projection — when it differs from `advanced_gbt_mempool`, the audit
    /// path must clone the mempool before projecting (§9 design note).
    pub advanced_gbt_audit: bool,
    /// Whether the native Rust GBT implementation is available.
    pub rust_gbt: bool,
    pub backend: Backend,
    pub accelerations: bool,
    pub audit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            initial_blocks_amount: 8,
            max_tracked_addresses: 100,
            advanced_gbt_mempool: false,
            advanced_gbt_audit: false,
            rust_gbt: false,
            backend: Backend::Esplora,
            accelerations: false,
            audit: false,
        }
    }
}

impl Config {
    /// Whether the audit path needs a cloned mempool snapshot rather than
    /// being able to reuse the live projection (§9 design note).
    pub fn audit_needs_mempool_clone(&self) -> bool {
        self.advanced_gbt_audit != self.advanced_gbt_mempool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_is_esplora() {
        assert_eq!(Config::default().backend, Backend::Esplora);
    }

    #[test]
    fn clone_needed_only_when_algorithms_differ() {
        let mut c = Config::default();
        assert!(!c.audit_needs_mempool_clone());
        c.advanced_gbt_audit = true;
        assert!(c.audit_needs_mempool_clone());
    }
}
