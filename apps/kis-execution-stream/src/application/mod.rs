//! Application Layer - Use cases and port definitions.
//!
//! Ports describe the external collaborators (credential cache, credential
//! issuer, stream transport, execution handler); services hold the logic
//! that drives them.

/// Port interfaces for external systems.
pub mod ports;

/// Application services (approval key lifecycle).
pub mod services;
