// SPDX-License-Identifier: CC0-1.0

//! Error kinds for the decoder and engine (§7), hand-written with their own
//! `Display`/`std::error::Error` impls rather than pulled in from a derive
//! macro crate.

use std::{error, fmt};

/// §7 kind 1: a malformed inbound frame. The connection is closed and this
/// is logged at debug, never surfaced to the client.
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodeError {
    Json(serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "malformed frame: {}", e),
        }
    }
}

impl error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
        }
    }
}

// §7 kind 4 ("collaborator must-be-present violation: raise a programming
// error, not recoverable inside the handler") has no counterpart here:
// `Engine::new` takes its `Collaborators` bundle by value, so an `Engine`
// without bound collaborators cannot be constructed in the first place —
// the illegal state is unrepresentable rather than an error type to define.
