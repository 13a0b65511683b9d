// SPDX-License-Identifier: CC0-1.0

//! Error type shared by every collaborator trait in this crate.

use std::{error, fmt};

/// An error surfaced by a collaborator call. The fan-out core treats these
/// as upstream transient failures (§7 kind 3): log at debug, skip that
/// enrichment, keep going with whatever else is ready for the client.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The collaborator's backing store or process is unreachable.
    Unavailable(String),
    /// The request referred to something the collaborator doesn't have
    /// (an unknown txid, an out-of-range block height, ...).
    NotFound(String),
    /// Any other collaborator-specific failure.
    Other(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unavailable(msg) => write!(f, "collaborator unavailable: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::Other(e) => write!(f, "collaborator error: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
