// SPDX-License-Identifier: CC0-1.0

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{ClientTransport, Error};

/// The send half of an upgraded WebSocket connection. The HTTP upgrade
/// handshake itself is out of scope (§1); this type only wraps the already
/// upgraded stream.
pub struct WebSocketTransport<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    remote_address: String,
    open: AtomicBool,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(sink: SplitSink<WebSocketStream<S>, Message>, remote_address: impl Into<String>) -> Self {
        WebSocketTransport { sink: Mutex::new(sink), remote_address: remote_address.into(), open: AtomicBool::new(true) }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl<S> ClientTransport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    async fn send_text(&self, frame: String) -> Result<(), Error> {
        if !self.is_open() {
            // §7 kind 5: socket not open at send time, silently skip.
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        match sink.send(Message::Text(frame.into())).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.mark_closed();
                Err(e.into())
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    fn remote_address(&self) -> String {
        self.remote_address.clone()
    }
}
