// SPDX-License-Identifier: CC0-1.0

//! A minimal async text-frame transport, wrapping `tokio-tungstenite` behind
//! a small trait: the fan-out core depends only on a `Sink`/`Stream` of text
//! frames, never on `tokio-tungstenite` directly.

mod error;
mod websocket;

pub use error::Error;
pub use websocket::WebSocketTransport;

use async_trait::async_trait;

/// A single client connection's send half, as the core engine sees it.
/// Implementations must make `send` a no-op (not an error) once the
/// connection is no longer writable — §5's "ready-state check before each
/// send" / §7 kind 5 ("socket not open at send time: silently skip").
#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// Sends one text frame. Returns `Ok(())` even if the socket was
    /// already closed; callers that need to know should use
    /// [`ClientTransport::is_open`].
    async fn send_text(&self, frame: String) -> Result<(), Error>;

    /// Whether the socket is still open for writing.
    fn is_open(&self) -> bool;

    /// A display string for the remote peer, used to seed
    /// `ClientSession::remote_address`.
    fn remote_address(&self) -> String;
}
