//! WebSocket Transport
//!
//! `tokio-tungstenite` adapter for the transport ports. Server pings are
//! answered here and never reach the listener; close frames and end of
//! stream both surface as `Ok(None)`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FrameTransport, TransportConnector, TransportError, WireFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections with a bounded handshake.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector that gives up on the handshake after
    /// `connect_timeout`.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TransportConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameTransport>, TransportError> {
        let (stream, _response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| TransportError::ConnectTimeout)?
                .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url, "WebSocket connected");
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// An open WebSocket connection.
pub struct WebSocketTransport {
    stream: WsStream,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl FrameTransport for WebSocketTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text.to_owned()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<Option<WireFrame>, TransportError> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Ok(None);
            };

            match message.map_err(|e| TransportError::Receive(e.to_string()))? {
                Message::Text(text) => return Ok(Some(WireFrame::Text(text.as_str().to_owned()))),
                Message::Binary(data) => return Ok(Some(WireFrame::Binary(data.to_vec()))),
                Message::Pong(_) => return Ok(Some(WireFrame::Pong)),
                Message::Ping(data) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| TransportError::Send(e.to_string()))?;
                }
                Message::Close(frame) => {
                    tracing::debug!(frame = ?frame, "Server sent close frame");
                    return Ok(None);
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}
