//! KIS Adapters
//!
//! - **approval**: approval key issuance over HTTP
//! - **transport**: WebSocket transport (`tokio-tungstenite`)
//! - **messages**: subscription request/ack wire types
//! - **cipher** / **codec**: frame decryption and classification
//! - **client**: connect/subscribe supervisor and listener

pub mod approval;
pub mod cipher;
pub mod client;
pub mod codec;
pub mod error;
pub mod keepalive;
pub mod messages;
pub mod reconnect;
pub mod transport;

pub use approval::HttpApprovalKeyIssuer;
pub use cipher::{CipherError, StreamEncryptionContext};
pub use client::{ClientConfig, ExecutionStreamClient};
pub use codec::{Frame, FrameCodec};
pub use error::{StreamClientError, SubscriptionAckError};
pub use keepalive::{KeepaliveAction, KeepaliveConfig, KeepaliveState};
pub use messages::{SubscriptionAck, SubscriptionRequest};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use transport::{WebSocketConnector, WebSocketTransport};
