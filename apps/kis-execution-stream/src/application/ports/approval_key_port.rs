//! Approval Key Ports (Driven Ports)
//!
//! The cache that persists the approval key between process runs, and the
//! remote endpoint that issues new keys.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::credential::ApprovalKey;

/// Credential cache error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Connection to the cache failed or was lost.
    #[error("cache connection error: {message}")]
    Connection {
        /// Underlying error message.
        message: String,
    },

    /// A command was rejected by the cache.
    #[error("cache command failed: {message}")]
    Command {
        /// Underlying error message.
        message: String,
    },

    /// The store was released and can no longer be used.
    #[error("cache connection already released")]
    Released,
}

/// Failure to obtain a new approval key from the issuance endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialIssuanceError {
    /// The endpoint could not be reached.
    #[error("approval key request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("approval key endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body was not valid JSON.
    #[error("approval key response could not be decoded: {0}")]
    Decode(String),

    /// The response had no usable `approval_key` field.
    #[error("approval key response is missing the `approval_key` field")]
    MissingField,
}

/// Single-value cache holding the approval key.
///
/// The adapter owns the (fixed) cache key; callers only see the value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApprovalKeyStore: Send + Sync {
    /// Read the cached value, if any.
    async fn get(&self) -> Result<Option<String>, CacheError>;

    /// Write the value with a time-to-live.
    async fn set(&self, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Release the underlying connection. Must be idempotent.
    async fn release(&self);
}

/// Remote approval key issuance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApprovalKeyIssuer: Send + Sync {
    /// Issue a brand new approval key.
    async fn issue(&self) -> Result<ApprovalKey, CredentialIssuanceError>;
}
