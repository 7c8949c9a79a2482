//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the execution
//! stream client itself.

/// Redis-backed approval key cache.
pub mod cache;

/// Configuration loading.
pub mod config;

/// KIS adapters: approval issuance, transport, frame codec, stream client.
pub mod kis;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
