//! Domain Layer - Core types for the execution-report feed.
//!
//! Pure Rust types with serialization support and no I/O.

/// Connection lifecycle states.
pub mod connection;

/// Normalized execution (fill) events.
pub mod execution;

/// Report streams, environments and subscription identities.
pub mod stream;

/// Approval key (session credential) value type.
pub mod credential;
