// SPDX-License-Identifier: CC0-1.0

use std::{error, fmt};

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The underlying WebSocket connection failed.
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// The connection was already closed when a send was attempted.
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Error {
        Error::WebSocket(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WebSocket(e) => write!(f, "websocket error: {}", e),
            Error::Closed => write!(f, "connection already closed"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::WebSocket(e) => Some(e),
            Error::Closed => None,
        }
    }
}
