//! Stream Transport Ports (Driven Ports)
//!
//! A message-oriented duplex socket. Frames are opaque text or binary
//! messages; transport-level pings are answered by the adapter and never
//! surface as frames.

use async_trait::async_trait;

/// Transport error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Opening the connection did not finish in time.
    #[error("connect timed out")]
    ConnectTimeout,

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// Closing the connection failed.
    #[error("close failed: {0}")]
    Close(String),
}

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// UTF-8 text message.
    Text(String),
    /// Binary message.
    Binary(Vec<u8>),
    /// Reply to a ping this side sent.
    Pong,
}

/// An open transport connection.
#[async_trait]
pub trait FrameTransport: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Send a transport-level keepalive ping.
    async fn send_ping(&mut self) -> Result<(), TransportError>;

    /// Read the next frame. `Ok(None)` means the peer closed the connection.
    async fn next_frame(&mut self) -> Result<Option<WireFrame>, TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transport connections.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameTransport>, TransportError>;
}
