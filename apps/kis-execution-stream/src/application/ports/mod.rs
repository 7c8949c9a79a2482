//! Port Interfaces
//!
//! Driven ports (outbound) used by the execution stream client:
//!
//! - `ApprovalKeyStore`: single-value cache with TTL for the approval key
//! - `ApprovalKeyIssuer`: remote credential issuance endpoint
//! - `TransportConnector` / `FrameTransport`: message-oriented duplex socket
//! - `ExecutionHandler`: downstream consumer of decoded fills

mod approval_key_port;
mod execution_handler_port;
mod transport_port;

pub use approval_key_port::{ApprovalKeyIssuer, ApprovalKeyStore, CacheError, CredentialIssuanceError};
pub use execution_handler_port::{ExecutionHandler, HandlerError};
pub use transport_port::{FrameTransport, TransportConnector, TransportError, WireFrame};

#[cfg(test)]
pub use approval_key_port::{MockApprovalKeyIssuer, MockApprovalKeyStore};
