//! Stream Client Errors

use std::time::Duration;

use crate::application::ports::{CredentialIssuanceError, TransportError};

/// A subscription request was not confirmed.
///
/// Raised when the ack names a different stream, reports a non-zero status,
/// lacks decryption material, or is not JSON at all (empty codes).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("subscription to {stream_id} rejected (rt_cd={status_code:?}, msg_cd={message_code:?}): {message}")]
pub struct SubscriptionAckError {
    /// Stream the request was for.
    pub stream_id: String,
    /// `rt_cd` from the ack.
    pub status_code: String,
    /// `msg_cd` from the ack.
    pub message_code: String,
    /// `msg1` from the ack, or a local description.
    pub message: String,
}

impl SubscriptionAckError {
    /// Ack that could not be parsed.
    #[must_use]
    pub fn unparseable(stream_id: impl Into<String>, raw: &str) -> Self {
        Self {
            stream_id: stream_id.into(),
            status_code: String::new(),
            message_code: String::new(),
            message: format!("unparseable ack: {raw}"),
        }
    }

    /// Check whether the message code is in `codes`.
    #[must_use]
    pub fn has_message_code(&self, codes: &[String]) -> bool {
        let code = self.message_code.trim();
        !code.is_empty() && codes.iter().any(|c| c == code)
    }
}

/// Errors raised by the execution stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// Approval key could not be obtained.
    #[error("approval key issuance failed: {0}")]
    CredentialIssuance(#[from] CredentialIssuanceError),

    /// A subscription was not confirmed.
    #[error(transparent)]
    SubscriptionAck(#[from] SubscriptionAckError),

    /// `listen` was called without an established session.
    #[error("not connected")]
    NotConnected,

    /// Every allowed attempt failed.
    #[error("connection not established after {attempts} attempts")]
    ConnectionNotEstablished {
        /// Attempts made.
        attempts: u32,
    },

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Request serialization failed.
    #[error("failed to encode subscription request: {0}")]
    Encode(#[from] serde_json::Error),

    /// No ack arrived in time.
    #[error("no subscription ack for {stream_id} within {timeout:?}")]
    AckTimeout {
        /// Stream the request was for.
        stream_id: String,
        /// Configured ack timeout.
        timeout: Duration,
    },

    /// Outstanding ping went unanswered.
    #[error("keepalive timeout after {0:?}")]
    KeepaliveTimeout(Duration),

    /// Peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// The client was stopped.
    #[error("client stopped")]
    Stopped,
}

impl StreamClientError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::CredentialIssuance(_) => "credential",
            Self::SubscriptionAck(_) => "subscription_ack",
            Self::NotConnected => "not_connected",
            Self::ConnectionNotEstablished { .. } => "exhausted",
            Self::Transport(_) => "transport",
            Self::Encode(_) => "encode",
            Self::AckTimeout { .. } => "ack_timeout",
            Self::KeepaliveTimeout(_) => "keepalive_timeout",
            Self::ConnectionClosed => "closed",
            Self::Stopped => "stopped",
        }
    }
}
